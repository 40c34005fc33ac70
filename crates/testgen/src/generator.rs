use std::collections::HashMap;

use chrono::{DateTime, Duration, Local};
use kvoracle_core::history::KeyState;
use kvoracle_core::types::{IsolationKind, Key, Version};
use rand::distr::{Distribution, Uniform};
use rand::rngs::ThreadRng;
use rand::RngExt;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H:%M:%S%.3f";
const MAX_TX_OPERATIONS: u64 = 3;

#[derive(Clone, Debug, Default, Deserialize, Serialize, TypedBuilder)]
pub struct LogParams {
    pub id: u64,
    pub n_client: u64,
    pub n_thread: u64,
    pub n_map: u64,
    pub n_key: u64,
    pub n_operation: u64,
    /// Share of steps that run a transaction, in percent.
    #[builder(default = 20)]
    pub tx_percent: u64,
    /// Share of transactions that abort, in percent.
    #[builder(default = 10)]
    pub abort_percent: u64,
}

/// The logs of one simulated run, one per client.
#[derive(Deserialize, Serialize, Debug)]
pub struct GeneratedRun {
    params: LogParams,
    info: String,
    start: DateTime<Local>,
    end: DateTime<Local>,
    logs: Vec<Vec<String>>,
}

impl GeneratedRun {
    #[must_use]
    pub const fn get_id(&self) -> u64 {
        self.params.id
    }

    #[must_use]
    pub const fn get_params(&self) -> &LogParams {
        &self.params
    }

    /// Log lines of every client, indexed by client id.
    #[must_use]
    pub fn get_logs(&self) -> &[Vec<String>] {
        &self.logs
    }

    #[must_use]
    pub fn get_duration(&self) -> Duration {
        self.end - self.start
    }
}

/// A serial key-value store and the logs its clients write.
struct Simulation {
    rng: ThreadRng,
    store: HashMap<Key, KeyState>,
    version: i64,
    clock: DateTime<Local>,
    logs: Vec<Vec<String>>,
}

impl Simulation {
    fn new(n_client: u64) -> Self {
        Self {
            rng: rand::rng(),
            store: HashMap::new(),
            version: 0,
            clock: Local::now(),
            logs: (0..n_client).map(|_| Vec::new()).collect(),
        }
    }

    fn emit(&mut self, client: usize, thread: &str, kind: &str, payload: &str) {
        self.clock += Duration::milliseconds(1);
        let timestamp = self.clock.format(TIMESTAMP_FORMAT);
        self.logs[client].push(format!("{timestamp}, {thread}, {kind}, {payload}"));
    }

    fn value_at(&self, key: &Key, version: Version) -> Option<&str> {
        self.store
            .get(key)
            .and_then(|state| state.get_at_version(version))
    }

    fn store_put(&mut self, key: &Key, value: Option<String>, thread: &str, client: u64) {
        let version = Version(self.version);
        self.store
            .entry(key.clone())
            .or_insert_with(|| KeyState::new(key.clone()))
            .put(value, version, None, thread, client);
    }

    fn percent(&mut self, percent: u64) -> bool {
        let roll = Uniform::new(0, 100).unwrap();
        roll.sample(&mut self.rng) < percent
    }

    fn plain_step(&mut self, client: usize, thread: &str, key: &Key, step: u64) {
        let want_read = self.rng.random::<bool>();
        if want_read {
            let version = self.version;
            self.emit(client, thread, "Version", &version.to_string());
            let observed = self
                .value_at(key, Version(version))
                .unwrap_or("null")
                .to_string();
            self.emit(client, thread, "Read", &format!("{key}={observed}"));
            return;
        }

        self.version += 1;
        let version = self.version;
        self.emit(client, thread, "Version", &version.to_string());
        if self.percent(20) {
            self.emit(client, thread, "Rm", &key.to_string());
            self.store_put(key, None, thread, client as u64);
        } else {
            let value = format!("c{client}s{step}");
            self.emit(client, thread, "Write", &format!("{key}={value}"));
            self.store_put(key, Some(value), thread, client as u64);
        }
    }

    /// Run a whole transaction atomically against the current snapshot.
    fn transaction_step(&mut self, client: usize, keys: &[Key], params: &LogParams, step: u64) {
        let tx_id = format!("tx-{client}-{step}");
        let isolation = if self.rng.random::<bool>() {
            IsolationKind::Snapshot
        } else {
            IsolationKind::Optimistic
        };
        let token = isolation.token();
        let snapshot = self.version;
        let pick_key = Uniform::new(0, keys.len()).unwrap();
        let pick_len = Uniform::new(1, MAX_TX_OPERATIONS + 1).unwrap();

        self.emit(client, &tx_id, token, "start");
        let mut writes: HashMap<Key, Option<String>> = HashMap::new();
        for i in 0..pick_len.sample(&mut self.rng) {
            let key = &keys[pick_key.sample(&mut self.rng)];
            if self.rng.random::<bool>() {
                let observed = match writes.get(key) {
                    Some(own) => own.clone(),
                    None => self.value_at(key, Version(snapshot)).map(ToString::to_string),
                };
                let observed = observed.as_deref().unwrap_or("null");
                self.emit(client, &tx_id, "TxRead", &format!("{key}={observed},{snapshot}"));
            } else if self.percent(20) {
                self.emit(client, &tx_id, "TxRm", &format!("{key},{snapshot}"));
                writes.insert(key.clone(), None);
            } else {
                let value = format!("c{client}s{step}w{i}");
                self.emit(
                    client,
                    &tx_id,
                    "TxWrite",
                    &format!("{key}={value},{snapshot}"),
                );
                writes.insert(key.clone(), Some(value));
            }
        }

        if self.percent(params.abort_percent) {
            self.emit(client, &tx_id, token, "aborted");
            return;
        }
        self.version += 1;
        let commit = self.version;
        self.emit(client, &tx_id, token, &format!("end, {commit}"));
        for (key, value) in writes {
            self.store_put(&key, value, &tx_id, client as u64);
        }
    }
}

/// Generate the logs of one run of `params.n_client` clients issuing
/// `params.n_operation` steps in total against a serial store.
///
/// # Consistency invariant
///
/// Every generated log verifies without inconsistencies: each step observes
/// the store exactly as the replay will reconstruct it.
///
/// - Plain operations are preceded by a `Version` line carrying the store
///   version they executed at. Writes and removes get a fresh version.
/// - Transactions run atomically. Their reads and writes carry the snapshot
///   version, reads see the transaction's own writes first, and a commit gets
///   a fresh version.
///
/// Every client log ends with a successful liveness line.
///
/// # Panics
///
/// Panics if `n_client`, `n_thread`, `n_map` or `n_key` is zero (cannot
/// create a uniform distribution over an empty range).
#[must_use]
pub fn generate_single_run(params: &LogParams) -> Vec<Vec<String>> {
    let keys: Vec<Key> = (0..params.n_map)
        .flat_map(|map| (0..params.n_key).map(move |key| Key::new(format!("map{map}"), format!("key{key}"))))
        .collect();
    let pick_client = Uniform::new(0, params.n_client).unwrap();
    let pick_thread = Uniform::new(1, params.n_thread + 1).unwrap();
    let pick_key = Uniform::new(0, keys.len()).unwrap();

    let mut simulation = Simulation::new(params.n_client);
    for step in 0..params.n_operation {
        #[allow(clippy::cast_possible_truncation)]
        let client = pick_client.sample(&mut simulation.rng) as usize;
        if simulation.percent(params.tx_percent) {
            simulation.transaction_step(client, &keys, params, step);
        } else {
            let thread = format!("pool-1-thread-{}", pick_thread.sample(&mut simulation.rng));
            let key = &keys[pick_key.sample(&mut simulation.rng)];
            simulation.plain_step(client, &thread, key, step);
        }
    }

    for client in 0..simulation.logs.len() {
        simulation.emit(client, "main", "Liveness", "Success");
    }
    simulation.logs
}

#[must_use]
pub fn generate_mult_runs(
    n_run: u64,
    n_client: u64,
    n_thread: u64,
    n_map: u64,
    n_key: u64,
    n_operation: u64,
) -> Vec<GeneratedRun> {
    (0..n_run)
        .into_par_iter()
        .map(|id| {
            let params = LogParams::builder()
                .id(id)
                .n_client(n_client)
                .n_thread(n_thread)
                .n_map(n_map)
                .n_key(n_key)
                .n_operation(n_operation)
                .build();
            let start = Local::now();
            let logs = generate_single_run(&params);
            let end = Local::now();
            GeneratedRun {
                params,
                info: "generated".to_string(),
                start,
                end,
                logs,
            }
        })
        .collect()
}
