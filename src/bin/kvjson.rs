use kvjson::{cli, config, ErrorKind};

fn init_tracing() {
    use tracing_subscriber::{
        filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt as _, Registry,
    };

    Registry::default()
        .with(
            fmt::Layer::new()
                .with_writer(std::io::stderr)
                .with_timer(fmt::time::ChronoLocal::rfc_3339())
                .with_thread_ids(true)
                .with_target(true),
        )
        .with(
            EnvFilter::try_from_env(config::env::LOG_DIRECTIVE)
                .or_else(|_| EnvFilter::try_new("warn"))
                .unwrap(),
        )
        .init();
}

fn main() {
    init_tracing();

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .on_thread_start(|| tracing::trace!("thread start"))
        .on_thread_stop(|| tracing::trace!("thread stop"))
        .enable_io()
        .enable_time()
        .build()
        .unwrap()
        .block_on(async {
            run().await;
        })
}

async fn run() {
    if let Err(err) = cli::parse().run().await {
        eprintln!("{}", err);
        let code = match err.kind() {
            ErrorKind::NotFound => 2,
            ErrorKind::Connection => 3,
            _ => 1,
        };
        std::process::exit(code);
    };
}
