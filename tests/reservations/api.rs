use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use optimistic_rust::{DataService, Entity, MutationKind, MutationRequest, ServiceError};

/// Scripted backend: answers each request with the next queued reply.
pub struct ScriptedApi {
    replies: Mutex<Vec<Reply>>,
    pub calls: Mutex<Vec<(MutationKind, String)>>,
}

#[derive(Clone, Debug)]
pub enum Reply {
    Ok,
    Fail(&'static str),
    Hang,
    Slow(Duration),
}

impl ScriptedApi {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().rev().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl<E: Entity> DataService<E> for ScriptedApi {
    async fn execute(&self, request: &MutationRequest<E>) -> Result<(), ServiceError> {
        self.calls
            .lock()
            .unwrap()
            .push((request.kind(), request.target_id.clone()));
        let reply = self.replies.lock().unwrap().pop().unwrap_or(Reply::Ok);
        match reply {
            Reply::Ok => Ok(()),
            Reply::Fail(message) => Err(ServiceError::new(message)),
            Reply::Hang => std::future::pending().await,
            Reply::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}
