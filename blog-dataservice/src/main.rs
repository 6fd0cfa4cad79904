mod error;
mod service;
mod validation;

pub mod blog {
    tonic::include_proto!("blog");
}

use blog::data_service_server::DataServiceServer;
use blog_config::Settings;
use log::{error, info};
use miette::IntoDiagnostic;
use service::DataServiceImpl;
use tonic::transport::Server;

#[tokio::main]
async fn main() -> miette::Result<()> {
    env_logger::init();

    let settings = Settings::load().into_diagnostic()?;

    let store = blog_store::pool::connect(
        &settings.mysql_dsn(),
        settings.mysql_pool_size,
        settings.mysql_max_overflow,
    )
    .await
    .into_diagnostic()?;
    blog_store::pool::run_migrations(&store).await.into_diagnostic()?;

    if let Err(err) = blog_store::verify_schema(&store, &settings.mysql_db).await {
        error!("startup schema check failed, serving anyway: {err}");
    }

    let bus = blog_bus::StreamBus::connect(&settings.redis_url).into_diagnostic()?;

    let addr = format!("0.0.0.0:{}", settings.grpc_port)
        .parse()
        .into_diagnostic()?;
    let service = DataServiceImpl::new(bus, store, settings.stream_maxlen);

    info!("starting gRPC data service on {addr}");
    Server::builder()
        .add_service(DataServiceServer::new(service))
        .serve(addr)
        .await
        .into_diagnostic()?;

    Ok(())
}
