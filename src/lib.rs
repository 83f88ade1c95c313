pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod net;
pub mod routes;
pub mod state;

pub mod crypto {
    pub mod token;
}

pub mod models {
    pub mod user;
    pub mod session;
}

pub mod repositories {
    pub mod user;
    pub mod session;
    pub mod cache;
    #[cfg(test)]
    pub mod memory;
}

pub mod services {
    pub mod auth;
    pub mod credentials;
    pub mod sessions;
}

pub mod handlers {
    pub mod auth;
}

pub mod middleware_layer {
    pub mod auth;
}

pub mod validation {
    pub mod auth;
}
