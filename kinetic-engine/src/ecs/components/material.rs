// Copyright 2025 John Brosnihan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! Physics material

use serde::{Deserialize, Serialize};

/// How two material coefficients are merged at a contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineMode {
    /// Arithmetic mean
    #[default]
    Average,
    /// Smaller value
    Minimum,
    /// Larger value
    Maximum,
    /// Product
    Multiply,
}

impl CombineMode {
    /// Merge two coefficients; commutative for every mode
    pub fn combine(self, a: f32, b: f32) -> f32 {
        match self {
            CombineMode::Average => 0.5 * (a + b),
            CombineMode::Minimum => a.min(b),
            CombineMode::Maximum => a.max(b),
            CombineMode::Multiply => a * b,
        }
    }
}

/// Surface response coefficients
///
/// When two materials disagree on a combine mode the first body's mode wins;
/// the first body is the one with the lower entity index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsMaterial {
    /// Coulomb friction coefficient
    pub friction: f32,
    /// Coefficient of restitution in [0, 1]
    pub restitution: f32,
    /// Density (kg/m³)
    pub density: f32,
    /// Friction merge mode
    pub friction_combine: CombineMode,
    /// Restitution merge mode
    pub restitution_combine: CombineMode,
}

impl PhysicsMaterial {
    /// Create a material with average combine modes and unit density
    pub fn new(friction: f32, restitution: f32) -> Self {
        PhysicsMaterial {
            friction: friction.max(0.0),
            restitution: restitution.clamp(0.0, 1.0),
            ..Default::default()
        }
    }

    /// Builder: density
    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    /// Builder: combine modes
    pub fn with_combine(mut self, friction: CombineMode, restitution: CombineMode) -> Self {
        self.friction_combine = friction;
        self.restitution_combine = restitution;
        self
    }

    /// Contact friction between `a` (first body) and `b`
    pub fn combined_friction(a: &PhysicsMaterial, b: &PhysicsMaterial) -> f32 {
        a.friction_combine.combine(a.friction, b.friction)
    }

    /// Contact restitution between `a` (first body) and `b`
    pub fn combined_restitution(a: &PhysicsMaterial, b: &PhysicsMaterial) -> f32 {
        a.restitution_combine.combine(a.restitution, b.restitution)
    }
}

impl Default for PhysicsMaterial {
    fn default() -> Self {
        PhysicsMaterial {
            friction: 0.5,
            restitution: 0.0,
            density: 1000.0,
            friction_combine: CombineMode::Average,
            restitution_combine: CombineMode::Average,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_modes() {
        assert!((CombineMode::Average.combine(0.2, 0.4) - 0.3).abs() < 1e-6);
        assert_eq!(CombineMode::Minimum.combine(0.2, 0.4), 0.2);
        assert_eq!(CombineMode::Maximum.combine(0.2, 0.4), 0.4);
        assert!((CombineMode::Multiply.combine(0.5, 0.4) - 0.2).abs() < 1e-7);
    }

    #[test]
    fn test_first_body_mode_wins() {
        let a = PhysicsMaterial::new(0.2, 0.1).with_combine(CombineMode::Maximum, CombineMode::Minimum);
        let b = PhysicsMaterial::new(0.8, 0.9).with_combine(CombineMode::Minimum, CombineMode::Maximum);
        assert_eq!(PhysicsMaterial::combined_friction(&a, &b), 0.8);
        assert_eq!(PhysicsMaterial::combined_restitution(&a, &b), 0.1);
        assert_eq!(PhysicsMaterial::combined_friction(&b, &a), 0.2);
    }

    #[test]
    fn test_new_clamps_restitution() {
        assert_eq!(PhysicsMaterial::new(0.5, 1.5).restitution, 1.0);
    }
}
