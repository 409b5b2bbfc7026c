//! REST gateway command

use crate::config::{BackendConfig, Config};
use anyhow::{Context, Result};
use clap::Args;
use ferry_api::InMemoryAuthMethods;
use ferry_client::ClientConfig;
use ferry_gateway::marshal::MIME_WILDCARD;
use ferry_gateway::{
    register_auth_method_service_handler_from_endpoint,
    register_auth_method_service_handler_server, JsonMarshaler, ServeMux,
};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Args, Debug)]
pub struct GatewayArgs {
    /// YAML configuration file
    #[arg(short, long, env = "FERRY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    pub listen: Option<String>,

    /// Forward calls to the RPC server at this URL instead of serving them in-process
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Default call timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Pretty-print JSON responses
    #[arg(long)]
    pub pretty: bool,
}

impl GatewayArgs {
    /// The config file (or defaults) with flags applied on top
    pub fn resolve(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(listen) = &self.listen {
            config.listen = listen.clone();
        }
        if let Some(endpoint) = &self.endpoint {
            config.backend = BackendConfig::Remote {
                endpoint: endpoint.clone(),
            };
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.default_timeout_ms = Some(timeout_ms);
        }
        config.pretty |= self.pretty;
        Ok(config)
    }
}

/// Build the mux with the auth-method routes wired to the configured backend
pub fn build_mux(config: &Config) -> Result<ServeMux> {
    let mut builder = ServeMux::builder().metadata_prefix(&config.metadata_prefix);
    if config.pretty {
        builder = builder.marshaler(MIME_WILDCARD, JsonMarshaler::pretty());
    }
    if let Some(timeout) = config.default_timeout() {
        builder = builder.default_timeout(timeout);
    }
    if config.reject_unknown_query {
        builder = builder.reject_unknown_query_parameters();
    }
    let mut mux = builder.build();

    match &config.backend {
        BackendConfig::Local => {
            register_auth_method_service_handler_server(&mut mux, InMemoryAuthMethods::new())?
        }
        BackendConfig::Remote { endpoint } => register_auth_method_service_handler_from_endpoint(
            &mut mux,
            endpoint,
            ClientConfig::default(),
        )
        .with_context(|| format!("invalid backend endpoint {}", endpoint))?,
    }
    Ok(mux)
}

pub async fn run(args: GatewayArgs) -> Result<()> {
    let config = args.resolve()?;
    let mux = build_mux(&config)?;

    let listener = TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;
    info!(addr = %listener.local_addr()?, backend = ?config.backend, "gateway listening");

    axum::serve(listener, mux.into_router())
        .await
        .context("gateway server failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> GatewayArgs {
        GatewayArgs {
            config: None,
            listen: None,
            endpoint: None,
            timeout_ms: None,
            pretty: false,
        }
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = GatewayArgs {
            listen: Some("0.0.0.0:9000".into()),
            endpoint: Some("http://backend:9090".into()),
            timeout_ms: Some(250),
            pretty: true,
            ..args()
        }
        .resolve()
        .unwrap();
        assert_eq!(config.listen, "0.0.0.0:9000");
        assert_eq!(
            config.backend,
            BackendConfig::Remote {
                endpoint: "http://backend:9090".into()
            }
        );
        assert_eq!(config.default_timeout_ms, Some(250));
        assert!(config.pretty);
    }

    #[test]
    fn test_build_mux_options() {
        let config = Config {
            default_timeout_ms: Some(100),
            reject_unknown_query: true,
            ..Config::default()
        };
        let mux = build_mux(&config).unwrap();
        assert_eq!(mux.options().default_timeout, Some(std::time::Duration::from_millis(100)));
        assert!(!mux.options().ignore_unknown_query);
    }

    #[test]
    fn test_bad_endpoint_is_reported() {
        let config = Config {
            backend: BackendConfig::Remote {
                endpoint: "not a url".into(),
            },
            ..Config::default()
        };
        let err = build_mux(&config).err().expect("bad endpoint accepted");
        assert!(format!("{:#}", err).contains("invalid backend endpoint"));
    }
}
