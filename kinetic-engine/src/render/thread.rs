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
//! Render-thread affinity checks

use crate::error::{EngineError, Result};
use std::thread::{self, ThreadId};
use tracing::error;

/// Remembers the render thread and traps calls from any other
///
/// Debug builds panic on a violation; release builds log and return
/// [`EngineError::ThreadViolation`].
#[derive(Debug, Clone, Copy)]
pub struct RenderThreadChecker {
    owner: ThreadId,
}

impl RenderThreadChecker {
    /// Bind to the calling thread
    pub fn new() -> Self {
        RenderThreadChecker {
            owner: thread::current().id(),
        }
    }

    /// Rebind to the calling thread, e.g. after handing the renderer over
    pub fn rebind(&mut self) {
        self.owner = thread::current().id();
    }

    /// True on the render thread
    pub fn is_render_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Verify that `operation` runs on the render thread
    pub fn check(&self, operation: &'static str) -> Result<()> {
        if self.is_render_thread() {
            return Ok(());
        }
        debug_assert!(false, "`{operation}` called off the render thread");
        error!(operation, "render call off the render thread");
        Err(EngineError::ThreadViolation(operation))
    }
}

impl Default for RenderThreadChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_thread_passes() {
        let checker = RenderThreadChecker::new();
        assert!(checker.check("present").is_ok());
    }

    #[test]
    fn test_other_thread_is_flagged() {
        let checker = RenderThreadChecker::new();
        let outcome = thread::spawn(move || {
            std::panic::catch_unwind(|| checker.check("present")).map(|r| r.is_err())
        })
        .join()
        .unwrap();
        // debug builds panic, release builds return an error
        match outcome {
            Ok(flagged) => assert!(flagged),
            Err(_) => assert!(cfg!(debug_assertions)),
        }
    }
}
