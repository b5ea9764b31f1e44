use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};

use tutorly_server::{
    app_state::AppState,
    config::Config,
    graphql::create_schema,
    handlers,
    middleware::RequestIdMiddleware,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env();
    if let Err(err) = config.validate_for_production() {
        log::warn!("Configuration is not production ready: {}", err);
    }

    let app_state = AppState::new(&config)
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    let schema = create_schema(app_state.clone());

    let bind = (config.web_server_host.clone(), config.web_server_port);
    log::info!("Starting HTTP server on {}:{}", bind.0, bind.1);
    log::info!("GraphiQL playground: http://{}:{}/graphiql", bind.0, bind.1);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::Data::new(schema.clone()))
            .wrap(RequestIdMiddleware)
            .wrap(Logger::new("%a \"%r\" %s %T %{x-request-id}o"))
            .wrap(Cors::permissive())
            .service(handlers::health_check)
            .service(handlers::health_check_ready)
            .service(handlers::graphql)
            .service(handlers::graphiql)
    })
    .bind(bind)?
    .run()
    .await
}
