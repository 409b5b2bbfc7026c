//! RPC backend command

use anyhow::{Context, Result};
use clap::Args;
use ferry_api::{add_service, InMemoryAuthMethods, SERVICE_NAME};
use ferry_server::FerryServer;
use std::net::SocketAddr;
use tracing::info;

#[derive(Args, Debug)]
pub struct BackendArgs {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:9090")]
    pub listen: SocketAddr,
}

pub async fn run(args: BackendArgs) -> Result<()> {
    let server = add_service(FerryServer::builder(), InMemoryAuthMethods::new()).build();
    info!(service = SERVICE_NAME, addr = %args.listen, "serving in-memory backend");
    server
        .serve(args.listen)
        .await
        .with_context(|| format!("backend on {} failed", args.listen))
}
