// SPDX-License-Identifier: MPL-2.0

//! Timer capability handed to the applet controller

use std::time::Duration;

use futures_util::future::{AbortHandle, Abortable, BoxFuture};

/// Handle to a scheduled task.
#[derive(Debug, Clone)]
pub struct CancelToken(AbortHandle);

impl CancelToken {
    /// Prevents the task from running if it has not fired yet.
    pub fn cancel(&self) {
        self.0.abort();
    }
}

pub trait Scheduler {
    /// Runs `task` once after `after` has elapsed.
    fn schedule(&self, after: Duration, task: BoxFuture<'static, ()>) -> CancelToken;
}

/// Schedules tasks on the ambient tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule(&self, after: Duration, task: BoxFuture<'static, ()>) -> CancelToken {
        let (handle, registration) = AbortHandle::new_pair();
        let delayed = async move {
            tokio::time::sleep(after).await;
            task.await;
        };
        tokio::spawn(Abortable::new(delayed, registration));
        CancelToken(handle)
    }
}
