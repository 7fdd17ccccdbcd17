//! Scripted transport for client tests
//!
//! Responses are full JSON-RPC envelopes, consumed in order. A call with
//! no scripted response left panics, so tests also assert that no hidden
//! round-trips happen.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use erp_client::rpc::ErpTransport;
use erp_client::{ErpClient, ErpConfig, ErpResult};
use shared::RequestCache;

pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Value>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<Value>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ErpTransport for ScriptedTransport {
    async fn call(&self, _url: &str, body: Value) -> ErpResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(body);
        let response = self
            .responses
            .lock()
            .pop_front()
            .expect("unexpected RPC call: no scripted response left");
        Ok(response)
    }
}

pub fn test_config() -> Arc<ErpConfig> {
    Arc::new(ErpConfig {
        domain: "erp.test".to_string(),
        database: "testdb".to_string(),
        user_id: "1".to_string(),
        password: "secret".to_string(),
        access_key: "key".to_string(),
    })
}

pub fn client_with(transport: Arc<ScriptedTransport>) -> ErpClient {
    ErpClient::new(test_config(), transport, Arc::new(RequestCache::new()))
}
