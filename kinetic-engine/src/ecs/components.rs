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
//! Built-in components
//!
//! Small plain-data components owned by value in the registry. Materials are
//! shared through `Arc` because one material usually backs many colliders.

mod collider;
mod joint;
mod material;
mod rigid_body;
mod transform;

pub use collider::Collider;
pub use joint::{
    DistanceJointData, FixedJointData, HingeJointData, JointCache, JointKind, JointMotor,
    PhysicsJoint, SliderJointData, SpringJointData,
};
pub use material::{CombineMode, PhysicsMaterial};
pub use rigid_body::{BodyType, RigidBody};
pub use transform::Transform;
