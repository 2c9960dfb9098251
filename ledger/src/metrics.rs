use once_cell::sync::Lazy;
use prometheus::{
    proto::MetricFamily, Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

use crate::types::TransactionKind;

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

pub static TRANSACTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "ledgerd_transactions_total",
            "Number of deposits and withdrawals committed by ledgerd",
        ),
        &["kind"],
    )
    .expect("create transactions counter");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("register transactions counter");
    counter
});

pub static REJECTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "ledgerd_rejections_total",
            "Number of ledger operations rejected, by reason",
        ),
        &["reason"],
    )
    .expect("create rejections counter");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("register rejections counter");
    counter
});

pub static ACCOUNT_GAUGE: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::with_opts(Opts::new(
        "ledgerd_accounts",
        "Current number of accounts known to ledgerd",
    ))
    .expect("create accounts gauge");
    REGISTRY
        .register(Box::new(gauge.clone()))
        .expect("register accounts gauge");
    gauge
});

pub fn set_account_count(count: usize) {
    ACCOUNT_GAUGE.set(count as i64);
}

pub fn inc_transactions(kind: TransactionKind) {
    TRANSACTIONS_TOTAL.with_label_values(&[kind.as_str()]).inc();
}

pub fn inc_rejections(reason: &str) {
    REJECTIONS_TOTAL.with_label_values(&[reason]).inc();
}

pub fn gather() -> Vec<MetricFamily> {
    REGISTRY.gather()
}

pub fn encode() -> Vec<u8> {
    let metric_families = gather();
    let mut buffer = Vec::new();
    if let Err(err) = TextEncoder::new().encode(&metric_families, &mut buffer) {
        tracing::error!(%err, "encode metrics");
    }
    buffer
}
