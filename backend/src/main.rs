#![deny(clippy::all)]
#![warn(clippy::nursery)]
#![warn(clippy::pedantic)]
#![warn(clippy::todo)]
// #![warn(clippy::cargo)]
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]

#[tokio::main]
async fn main() {
    app::run().await;
}


pub mod cfg {
    mod app_settings;
    mod checkin_settings;
    mod database_settings;
    mod face_oracle_settings;
    mod jwt_settings;
    mod rate_limit_settings;
    mod server_settings;
    mod storage_settings;

    pub use app_settings::*;
    pub use checkin_settings::*;
    pub use database_settings::*;
    pub use face_oracle_settings::*;
    pub use jwt_settings::*;
    pub use rate_limit_settings::*;
    pub use server_settings::*;
    pub use storage_settings::*;
}

pub mod core {
    mod context;
    mod db;

    pub use context::*;
    pub use db::*;
}

pub mod auth {
    mod guard;
    mod jwt;
    mod password;
    mod session;

    pub use guard::*;
    pub use jwt::*;
    pub use password::*;
    pub use session::*;
}

pub mod store {
    mod attendance;
    mod employees;
    mod refresh_sessions;
    mod tenants;

    pub use attendance::*;
    pub use employees::*;
    pub use refresh_sessions::*;
    pub use tenants::*;
}

pub mod checkin {
    mod geofence;
    mod protocol;
    mod verification;

    pub use geofence::*;
    pub use protocol::*;
    pub use verification::*;
}

pub mod services {
    mod audit;
    mod face_oracle;
    mod object_store;

    pub use audit::*;
    pub use face_oracle::*;
    pub use object_store::*;
}

pub mod middleware {
    mod rate_limit;

    pub use rate_limit::*;
}

pub mod routes {
    pub mod api;
    pub mod attendance;
    pub mod auth;
    pub mod checkin;
    pub mod employees;
    pub mod health;
    pub mod tenant;
    pub mod uploads;
}

pub mod app {
    mod cli;
    mod migrations;
    mod router;
    mod server;

    pub use cli::*;
    pub use migrations::*;
    pub use router::*;
    pub use server::*;
}
