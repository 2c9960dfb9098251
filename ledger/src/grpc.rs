use std::future::Future;
use std::net::SocketAddr;

use chrono::Utc;
use prometheus::IntGauge;
use tonic::{transport::Server, Request, Response, Status};

use crate::metrics;
use crate::proto::ledger_service_server::{LedgerService, LedgerServiceServer};
use crate::proto::{
    Balance as ProtoBalance, GetBalanceRequest, GetTransactionsRequest, GetTransactionsResponse,
    ListTransactionsRequest, ListTransactionsResponse, Transaction as ProtoTransaction,
    TransactionKind as ProtoKind, TransactionRequest,
};
use crate::{AccountId, LedgerEngine, LedgerError, Transaction, TransactionKind};
use prost_types::Timestamp;

/// Serves the ledger over gRPC until `shutdown` resolves.
pub async fn serve(
    addr: SocketAddr,
    ledger: LedgerEngine,
    shutdown: impl Future<Output = ()>,
) -> Result<(), tonic::transport::Error> {
    Server::builder()
        .add_service(service(ledger))
        .serve_with_shutdown(addr, shutdown)
        .await
}

pub fn service(ledger: LedgerEngine) -> LedgerServiceServer<GrpcLedger> {
    LedgerServiceServer::new(GrpcLedger::new(ledger, metrics::ACCOUNT_GAUGE.clone()))
}

pub struct GrpcLedger {
    ledger: LedgerEngine,
    accounts: IntGauge,
}

impl GrpcLedger {
    pub fn new(ledger: LedgerEngine, accounts: IntGauge) -> Self {
        Self { ledger, accounts }
    }

    // Rejected withdrawals and balance reads can create accounts too.
    fn sync_account_gauge(&self) {
        self.accounts.set(self.ledger.account_count() as i64);
    }

    fn record<T>(&self, kind: TransactionKind, res: Result<T, LedgerError>) -> Result<T, Status> {
        self.sync_account_gauge();
        match res {
            Ok(value) => {
                metrics::inc_transactions(kind);
                Ok(value)
            }
            Err(err) => {
                metrics::inc_rejections(err.reason());
                Err(map_error(err))
            }
        }
    }
}

#[tonic::async_trait]
impl LedgerService for GrpcLedger {
    async fn deposit(
        &self,
        request: Request<TransactionRequest>,
    ) -> Result<Response<ProtoTransaction>, Status> {
        let TransactionRequest { account_id, amount } = request.into_inner();
        let account = parse_account(&account_id)?;
        let tx = self.record(TransactionKind::Deposit, self.ledger.deposit(account, amount))?;
        Ok(Response::new(to_proto_transaction(tx)))
    }

    async fn withdraw(
        &self,
        request: Request<TransactionRequest>,
    ) -> Result<Response<ProtoTransaction>, Status> {
        let TransactionRequest { account_id, amount } = request.into_inner();
        let account = parse_account(&account_id)?;
        let tx = self.record(
            TransactionKind::Withdrawal,
            self.ledger.withdraw(account, amount),
        )?;
        Ok(Response::new(to_proto_transaction(tx)))
    }

    async fn get_balance(
        &self,
        request: Request<GetBalanceRequest>,
    ) -> Result<Response<ProtoBalance>, Status> {
        let account = parse_account(&request.into_inner().account_id)?;
        let res = self.ledger.get_balance(account);
        self.sync_account_gauge();
        match res {
            Ok(balance) => Ok(Response::new(ProtoBalance {
                account_id: account.to_string(),
                amount: balance.amount,
                updated_at: Some(timestamp(balance.updated_at)),
            })),
            Err(err) => Err(map_error(err)),
        }
    }

    async fn get_transactions(
        &self,
        request: Request<GetTransactionsRequest>,
    ) -> Result<Response<GetTransactionsResponse>, Status> {
        let account = parse_account(&request.into_inner().account_id)?;
        match self.ledger.get_transactions(account) {
            Ok(txs) => Ok(Response::new(GetTransactionsResponse {
                items: txs.into_iter().map(to_proto_transaction).collect(),
            })),
            Err(err) => Err(map_error(err)),
        }
    }

    async fn list_transactions(
        &self,
        request: Request<ListTransactionsRequest>,
    ) -> Result<Response<ListTransactionsResponse>, Status> {
        let req = request.into_inner();
        match self
            .ledger
            .list_transactions(req.limit as usize, req.after_sequence)
        {
            Ok((txs, next)) => Ok(Response::new(ListTransactionsResponse {
                items: txs.into_iter().map(to_proto_transaction).collect(),
                next_after: next.unwrap_or(0),
            })),
            Err(err) => Err(map_error(err)),
        }
    }
}

fn parse_account(raw: &str) -> Result<AccountId, Status> {
    AccountId::parse(raw).map_err(|_| Status::invalid_argument("invalid account id"))
}

fn map_error(err: LedgerError) -> Status {
    match err {
        LedgerError::InvalidAmount { .. } => Status::invalid_argument(err.to_string()),
        LedgerError::InsufficientFunds { .. } => Status::failed_precondition(err.to_string()),
        LedgerError::AmountOverflow => Status::internal("amount overflow"),
        LedgerError::Unknown(detail) => {
            tracing::error!(%detail, "ledger invariant violated");
            Status::internal("internal ledger failure")
        }
    }
}

fn to_proto_transaction(tx: Transaction) -> ProtoTransaction {
    let kind = match tx.kind {
        TransactionKind::Deposit => ProtoKind::Deposit,
        TransactionKind::Withdrawal => ProtoKind::Withdrawal,
    };
    ProtoTransaction {
        id: tx.id.to_string(),
        account_id: tx.account_id.to_string(),
        amount: tx.amount,
        kind: kind as i32,
        resulting_balance: tx.resulting_balance,
        created_at: Some(timestamp(tx.created_at)),
        sequence: tx.sequence,
    }
}

fn timestamp(time: chrono::DateTime<Utc>) -> Timestamp {
    Timestamp {
        seconds: time.timestamp(),
        nanos: time.timestamp_subsec_nanos() as i32,
    }
}
