use actix_web::{web, App, HttpServer};
use actix_web::dev::Server;
use std::net::TcpListener;

use crate::configuration::AuthSettings;
use crate::middleware::{AccessTokenMiddleware, RequestLogger};
use crate::routes::{health_check, login, logout, me, refresh, register};
use crate::store::{SessionStore, UserStore};

/// Build and start the server on `listener`, serving all flows against
/// the given store backend.
pub fn run<S>(
    listener: TcpListener,
    store: S,
    auth_settings: AuthSettings,
) -> Result<Server, std::io::Error>
where
    S: SessionStore + UserStore + Clone + Send + Sync + 'static,
{
    let store = web::Data::new(store);
    let settings_data = web::Data::new(auth_settings.clone());

    let server = HttpServer::new(move || {
        App::new()
            .wrap(RequestLogger)

            // Shared state
            .app_data(store.clone())
            .app_data(settings_data.clone())

            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/auth/register", web::post().to(register::<S>))
            .route("/auth/login", web::post().to(login::<S>))
            .route("/auth/refresh", web::post().to(refresh::<S>))
            .route("/auth/logout", web::post().to(logout::<S>))

            // Protected routes (require a bearer access token)
            .service(
                web::scope("/auth")
                    .wrap(AccessTokenMiddleware::new(auth_settings.clone()))
                    .route("/me", web::get().to(me::<S>)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
