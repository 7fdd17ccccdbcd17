//! Reference-data manager: cooldown gating and two-tier lookups

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use common::{ScriptedTransport, client_with, test_config};
use erp_client::reference::{CountryEntry, StateEntry, TaxEntry};
use erp_client::{ErpConfig, ErpError, ErpResult, ReferenceData, ReferenceSnapshot, SnapshotFetcher};

struct FailingFetcher {
    calls: AtomicUsize,
}

#[async_trait]
impl SnapshotFetcher for FailingFetcher {
    async fn fetch(&self, _config: &ErpConfig) -> ErpResult<ReferenceSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ErpError::Remote {
            status: 503,
            body: "upstream down".to_string(),
        })
    }
}

struct StaticFetcher {
    snapshot: ReferenceSnapshot,
    calls: AtomicUsize,
}

#[async_trait]
impl SnapshotFetcher for StaticFetcher {
    async fn fetch(&self, _config: &ErpConfig) -> ErpResult<ReferenceSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshot.clone())
    }
}

#[tokio::test(start_paused = true)]
async fn test_failed_load_is_not_retried_inside_cooldown() {
    let fetcher = Arc::new(FailingFetcher {
        calls: AtomicUsize::new(0),
    });
    let reference = ReferenceData::new(test_config(), fetcher.clone());

    assert!(reference.load().await.is_err());
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

    // Inside the cooldown the cached error is returned without a fetch.
    assert!(matches!(
        reference.load().await,
        Err(ErpError::ReferenceData(_))
    ));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

    // After the cooldown exactly one more attempt is allowed.
    tokio::time::advance(Duration::from_secs(11)).await;
    assert!(reference.load().await.is_err());
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_snapshot_is_fetched_once() {
    let fetcher = Arc::new(StaticFetcher {
        snapshot: ReferenceSnapshot::default(),
        calls: AtomicUsize::new(0),
    });
    let reference = ReferenceData::new(test_config(), fetcher.clone());

    reference.load().await.unwrap();
    reference.load().await.unwrap();
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
}

fn snapshot_with_country() -> ReferenceSnapshot {
    let mut snapshot = ReferenceSnapshot::default();
    let mut country = CountryEntry {
        id: 38,
        ..Default::default()
    };
    country.states.insert("ON".to_string(), StateEntry { id: 540 });
    snapshot.countries.insert("CA".to_string(), country);
    snapshot
}

#[tokio::test]
async fn test_country_lookup_prefers_snapshot() {
    let fetcher = Arc::new(StaticFetcher {
        snapshot: snapshot_with_country(),
        calls: AtomicUsize::new(0),
    });
    let reference = ReferenceData::new(test_config(), fetcher);

    // Any RPC call would pop an empty script and panic.
    let transport = ScriptedTransport::new(vec![]);
    let client = client_with(transport.clone());

    let (country, state) = reference
        .country_and_state_ids(&client, "CA", "ON")
        .await
        .unwrap();
    assert_eq!(country, Some(38));
    assert_eq!(state, Some(540));
    assert_eq!(transport.calls(), 0);

    // Known country, unknown state: country still served from snapshot.
    let (country, state) = reference
        .country_and_state_ids(&client, "CA", "XX")
        .await
        .unwrap();
    assert_eq!(country, Some(38));
    assert_eq!(state, None);
}

#[tokio::test]
async fn test_country_fallback_is_cached_per_request() {
    let fetcher = Arc::new(StaticFetcher {
        snapshot: ReferenceSnapshot::default(),
        calls: AtomicUsize::new(0),
    });
    let reference = ReferenceData::new(test_config(), fetcher);

    let transport = ScriptedTransport::new(vec![
        json!({"result": [{"id": 31}]}),
        json!({"result": [{"id": 99}]}),
    ]);
    let client = client_with(transport.clone());

    let (country, state) = reference
        .country_and_state_ids(&client, "US", "NY")
        .await
        .unwrap();
    assert_eq!(country, Some(31));
    assert_eq!(state, Some(99));
    assert_eq!(transport.calls(), 2);

    // Same codes again: both ids come from the request cache.
    let (country, state) = reference
        .country_and_state_ids(&client, "US", "NY")
        .await
        .unwrap();
    assert_eq!(country, Some(31));
    assert_eq!(state, Some(99));
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_tax_lookup_snapshot_then_fallback_create() {
    let mut snapshot = ReferenceSnapshot::default();
    snapshot.taxes.insert(
        "QF".to_string(),
        vec![TaxEntry {
            id: 12,
            name: "HST 13%".to_string(),
            description: "HST 13%".to_string(),
            amount: 13.0,
        }],
    );
    let fetcher = Arc::new(StaticFetcher {
        snapshot,
        calls: AtomicUsize::new(0),
    });
    let reference = ReferenceData::new(test_config(), fetcher);

    // Snapshot hit: no RPC traffic.
    let transport = ScriptedTransport::new(vec![]);
    let client = client_with(transport.clone());
    let tax = reference
        .tax_id(&client, "QF", 2, "HST 13%", 13.0)
        .await
        .unwrap();
    assert_eq!(tax, 12);
    assert_eq!(transport.calls(), 0);

    // Unseen rate: search comes back empty, the tax is created on demand,
    // and the id is cached for the rest of the request.
    let transport = ScriptedTransport::new(vec![
        json!({"result": []}),
        json!({"result": [55]}),
    ]);
    let client = client_with(transport.clone());
    let tax = reference
        .tax_id(&client, "QF", 2, "GST 5%", 5.0)
        .await
        .unwrap();
    assert_eq!(tax, 55);
    assert_eq!(transport.calls(), 2);

    let tax = reference
        .tax_id(&client, "QF", 2, "GST 5%", 5.0)
        .await
        .unwrap();
    assert_eq!(tax, 55);
    assert_eq!(transport.calls(), 2);

    // Unknown company code has no tax table.
    let result = reference.tax_id(&client, "ZZ", 9, "GST 5%", 5.0).await;
    assert!(matches!(result, Err(ErpError::ReferenceData(_))));
}
