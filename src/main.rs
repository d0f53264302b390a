use std::{process, sync::Arc, time::Duration};

use broadsheet::{
    application::{
        content_types::ContentTypeResolver,
        detail::{ContentDetailService, DetailSettings},
        editorial::EditorialService,
        error::AppError,
        repos::{
            ArticlesRepo, ArticlesWriteRepo, CategoriesRepo, ContentTypesRepo, ImagesRepo,
            SitesRepo, StaffTokensRepo,
        },
        staff::StaffService,
    },
    cache::{
        CacheBackend, CacheInvalidator, CacheKeyFormatter, CacheStore, ContentCache,
        MemoryCacheBackend,
    },
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AdminState, HttpState, RouterState},
        telemetry,
    },
};
use tokio::{sync::watch, try_join};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::IssueStaffToken(args) => run_issue_staff_token(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let router_state = build_application_context(repositories, &settings);

    info!(
        target = "broadsheet::serve",
        public = %settings.server.public_addr,
        admin = %settings.server.admin_addr,
        site_id = settings.site.id,
        cache_namespace = %settings.cache.namespace,
        cache_version = %settings.cache.version,
        html_cache = settings.cache.html_cache_enabled(),
        "starting listeners"
    );

    serve_http(&settings, router_state).await
}

async fn run_issue_staff_token(
    settings: config::Settings,
    args: config::IssueStaffTokenArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let tokens: Arc<dyn StaffTokensRepo> = repositories;
    let issued = StaffService::new(tokens).issue(&args.name).await?;

    info!(
        target = "broadsheet::staff",
        token_id = %issued.record.id,
        name = %issued.record.name,
        prefix = %issued.record.prefix,
        "staff token issued"
    );
    println!("{}", issued.token);
    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool =
        PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await
            .map_err(|err| InfraError::database(err.to_string()))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_application_context(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> RouterState {
    let articles_repo: Arc<dyn ArticlesRepo> = repositories.clone();
    let articles_write_repo: Arc<dyn ArticlesWriteRepo> = repositories.clone();
    let images_repo: Arc<dyn ImagesRepo> = repositories.clone();
    let categories_repo: Arc<dyn CategoriesRepo> = repositories.clone();
    let content_types_repo: Arc<dyn ContentTypesRepo> = repositories.clone();
    let sites_repo: Arc<dyn SitesRepo> = repositories.clone();
    let staff_repo: Arc<dyn StaffTokensRepo> = repositories.clone();

    let backend: Arc<dyn CacheBackend> =
        Arc::new(MemoryCacheBackend::new(settings.cache.capacity));
    let store = CacheStore::new(backend, settings.cache.long_ttl);
    let keys = CacheKeyFormatter::from_settings(&settings.cache);
    let cache = ContentCache::new(store.clone(), keys.clone());

    let content_types = ContentTypeResolver::new(content_types_repo, store.clone(), keys.clone());
    let detail = Arc::new(ContentDetailService::new(
        articles_repo.clone(),
        categories_repo.clone(),
        content_types,
        cache,
        DetailSettings {
            site_id: settings.site.id,
            html_ttl: settings.cache.html_ttl,
        },
    ));

    let invalidator = CacheInvalidator::new(store, keys, sites_repo, settings.site.id);
    let editorial = Arc::new(EditorialService::new(
        articles_repo,
        articles_write_repo,
        images_repo,
        categories_repo,
        invalidator,
    ));

    let admin_state = AdminState {
        editorial,
        db: repositories.clone(),
    };
    let http_state = HttpState {
        detail,
        staff: StaffService::new(staff_repo),
        db: repositories,
        base_url: Arc::from(settings.site.base_url.as_str()),
    };

    RouterState {
        http: http_state,
        admin: admin_state,
    }
}

async fn serve_http(settings: &config::Settings, router_state: RouterState) -> Result<(), AppError> {
    let public_router = http::build_router(router_state.clone()).with_state(router_state.clone());
    let admin_router = http::build_admin_router(router_state.clone()).with_state(router_state);

    let public_addr = settings.server.public_addr;
    let admin_addr = settings.server.admin_addr;
    let public_listener = tokio::net::TcpListener::bind(public_addr)
        .await
        .map_err(|err| InfraError::bind("public", public_addr, err))?;
    let admin_listener = tokio::net::TcpListener::bind(admin_addr)
        .await
        .map_err(|err| InfraError::bind("admin", admin_addr, err))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let public_server = axum::serve(public_listener, public_router.into_make_service())
        .with_graceful_shutdown(shutdown_requested(shutdown_rx.clone()));
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(shutdown_requested(shutdown_rx.clone()));

    let grace = settings.server.graceful_shutdown;
    let drain_deadline = async move {
        shutdown_requested(shutdown_rx).await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = async { try_join!(public_server, admin_server) } => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
            info!(target = "broadsheet::serve", "listeners stopped");
        }
        () = drain_deadline => {
            warn!(
                target = "broadsheet::serve",
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
        }
    }

    Ok(())
}

async fn shutdown_requested(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = "broadsheet::serve", error = %err, "ctrl-c handler failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(target = "broadsheet::serve", error = %err, "SIGTERM handler failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!(target = "broadsheet::serve", "shutdown requested");
}
