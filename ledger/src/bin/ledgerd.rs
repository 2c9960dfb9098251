use clap::Parser;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Response, Server};
use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info};

use account_ledger::telemetry::{self, LogFormat};
use account_ledger::{grpc, metrics, LedgerEngine};

#[derive(Parser, Debug)]
#[command(name = "ledgerd", about = "In-memory account ledger daemon")]
struct Args {
    #[arg(long, env = "LEDGERD_ADDR", default_value = "0.0.0.0:9091")]
    addr: SocketAddr,
    #[arg(long, env = "LEDGERD_METRICS_ADDR", default_value = "0.0.0.0:9102")]
    metrics_addr: SocketAddr,
    #[arg(long, env = "LEDGERD_LOG_FORMAT", default_value = "pretty")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    telemetry::init(args.log_format);

    let ledger = LedgerEngine::new();
    metrics::set_account_count(0);

    info!(addr = %args.addr, "ledgerd listening");
    info!(addr = %args.metrics_addr, "metrics exposed");

    let metrics_addr = args.metrics_addr;
    let metrics_handle = tokio::spawn(async move {
        if let Err(err) = serve_metrics(metrics_addr).await {
            error!(%err, "metrics server error");
        }
    });

    let shutdown = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(%err, "failed to listen for shutdown signal");
        }
        info!("shutting down");
    };
    let res = grpc::serve(args.addr, ledger.clone(), shutdown).await;
    metrics_handle.abort();
    res?;

    info!(
        accounts = ledger.account_count(),
        transactions = ledger.transaction_count(),
        "ledger state discarded"
    );
    Ok(())
}

async fn serve_metrics(addr: SocketAddr) -> Result<(), hyper::Error> {
    let make_svc = make_service_fn(|_| async {
        Ok::<_, hyper::Error>(service_fn(|_| async {
            let mut response = Response::new(Body::from(metrics::encode()));
            response.headers_mut().insert(
                hyper::header::CONTENT_TYPE,
                hyper::header::HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            Ok::<_, hyper::Error>(response)
        }))
    });

    Server::bind(&addr).serve(make_svc).await
}
