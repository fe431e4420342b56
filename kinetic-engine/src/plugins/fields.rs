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
//! Built-in force fields
//!
//! # Attractor
//!
//! Pulls every body toward a fixed point with a softened inverse-square law:
//!
//! **F = k · m · r̂ · r² / (r² + ε²)^(3/2)**
//!
//! where `k` is the strength (m³/s², i.e. G·M of the attracting mass), `r`
//! the distance from the body's center of mass and ε the softening length.
//! Softening keeps the force finite when a body passes through the center;
//! the same technique is standard in N-body codes (Aarseth, "Gravitational
//! N-Body Simulations", 2003).
//!
//! # Drag
//!
//! Linear plus quadratic air drag against the body's velocity:
//!
//! **F = −(c₁ · v + c₂ · |v| · v)**
//!
//! The linear term dominates at low speed (Stokes regime), the quadratic
//! term at high speed. Optional angular drag damps spin the same way.
//!
//! # Wind
//!
//! A uniform flow that pushes each body in proportion to the area it
//! presents to the wind. Bodies without a collider catch no wind.

use crate::math::Vec3;
use crate::plugins::api::{BodyView, ForceContribution, ForceField, Plugin, PluginContext};
use std::any::Any;

/// Default attractor softening length (m)
pub const DEFAULT_SOFTENING: f32 = 0.1;

/// Softened point attractor
#[derive(Debug, Clone, PartialEq)]
pub struct AttractorPlugin {
    center: Vec3,
    strength: f32,
    softening: f32,
    radius: Option<f32>,
}

impl AttractorPlugin {
    /// Attractor at `center` with strength `k` (m³/s²)
    ///
    /// # Panics
    ///
    /// Panics if `strength` is not finite.
    pub fn new(center: Vec3, strength: f32) -> Self {
        assert!(strength.is_finite(), "attractor strength must be finite");
        AttractorPlugin {
            center,
            strength,
            softening: DEFAULT_SOFTENING,
            radius: None,
        }
    }

    /// Builder: softening length
    ///
    /// # Panics
    ///
    /// Panics if `softening` is negative or not finite.
    pub fn with_softening(mut self, softening: f32) -> Self {
        assert!(
            softening >= 0.0 && softening.is_finite(),
            "softening must be non-negative and finite"
        );
        self.softening = softening;
        self
    }

    /// Builder: only bodies within `radius` feel the pull
    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = Some(radius.max(0.0));
        self
    }

    /// Attraction center
    pub fn center(&self) -> Vec3 {
        self.center
    }

    /// Move the attraction center
    pub fn set_center(&mut self, center: Vec3) {
        self.center = center;
    }

    /// Strength (m³/s²); negative values repel
    pub fn strength(&self) -> f32 {
        self.strength
    }
}

impl ForceField for AttractorPlugin {
    fn contribute(&self, body: &BodyView<'_>, _context: &PluginContext) -> ForceContribution {
        let offset = self.center - body.center_of_mass();
        let r2 = offset.length_squared();
        if self.radius.is_some_and(|r| r2 > r * r) {
            return ForceContribution::default();
        }
        let soft2 = r2 + self.softening * self.softening;
        if soft2 <= f32::EPSILON {
            return ForceContribution::default();
        }
        let scale = self.strength * body.mass() / (soft2 * soft2.sqrt());
        let force = offset * scale;
        if force.is_finite() {
            ForceContribution::force(force)
        } else {
            ForceContribution::default()
        }
    }
}

impl Plugin for AttractorPlugin {
    fn name(&self) -> &str {
        "attractor"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn as_force_field(&self) -> Option<&dyn ForceField> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Linear and quadratic air drag
#[derive(Debug, Clone, PartialEq)]
pub struct DragPlugin {
    linear: f32,
    quadratic: f32,
    angular: f32,
}

impl DragPlugin {
    /// Drag with linear (N·s/m) and quadratic (N·s²/m²) coefficients
    ///
    /// # Panics
    ///
    /// Panics if either coefficient is negative or not finite.
    pub fn new(linear: f32, quadratic: f32) -> Self {
        assert!(
            linear >= 0.0 && quadratic >= 0.0 && linear.is_finite() && quadratic.is_finite(),
            "drag coefficients must be non-negative and finite"
        );
        DragPlugin {
            linear,
            quadratic,
            angular: 0.0,
        }
    }

    /// Builder: angular drag coefficient (N·m·s/rad)
    pub fn with_angular(mut self, angular: f32) -> Self {
        self.angular = angular.max(0.0);
        self
    }

    /// (linear, quadratic) coefficients
    pub fn coefficients(&self) -> (f32, f32) {
        (self.linear, self.quadratic)
    }
}

impl ForceField for DragPlugin {
    fn contribute(&self, body: &BodyView<'_>, context: &PluginContext) -> ForceContribution {
        let v = body.linear_velocity();
        let mut force = -(self.linear + self.quadratic * v.length()) * v;

        // an explicit drag step must not reverse the velocity
        let mass = body.mass();
        let dt = context.timestep();
        if mass > 0.0 && dt > 0.0 {
            let max = v.length() * mass / dt;
            if force.length() > max {
                force = -v * (mass / dt);
            }
        }

        ForceContribution {
            force,
            torque: -self.angular * body.angular_velocity(),
        }
    }
}

impl Plugin for DragPlugin {
    fn name(&self) -> &str {
        "drag"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn as_force_field(&self) -> Option<&dyn ForceField> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Uniform wind
#[derive(Debug, Clone, PartialEq)]
pub struct WindPlugin {
    velocity: Vec3,
    pressure: f32,
}

impl WindPlugin {
    /// Wind blowing with `velocity`; `pressure` converts area to force (N/m²
    /// per unit of wind speed)
    pub fn new(velocity: Vec3, pressure: f32) -> Self {
        WindPlugin {
            velocity,
            pressure: pressure.max(0.0),
        }
    }

    /// Wind velocity
    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    /// Change the wind
    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }
}

impl ForceField for WindPlugin {
    fn contribute(&self, body: &BodyView<'_>, _context: &PluginContext) -> ForceContribution {
        if self.velocity == Vec3::ZERO {
            return ForceContribution::default();
        }
        let area = body.cross_section(self.velocity);
        ForceContribution::force(self.velocity * (self.pressure * area))
    }
}

impl Plugin for WindPlugin {
    fn name(&self) -> &str {
        "wind"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn as_force_field(&self) -> Option<&dyn ForceField> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
