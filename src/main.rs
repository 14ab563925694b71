//! Binary entrypoint: wires the process-wide app environment and serves the
//! HTTP api on 3030. See the library root for the full tour.

#![cfg_attr(not(test),
            forbid(missing_debug_implementations,
                   unreachable_pub,
                   unsafe_code,
                   unused_crate_dependencies))]
#![cfg_attr(not(test), deny(missing_copy_implementations))]

use std::env;

use chrono as _;
use http as _;
use idgov::{config::Settings, filters, State};
use nanoid as _;
use serde as _;
use serde_json as _;
use warp::Filter;

lazy_static::lazy_static! {
  static ref STATE: State = State::new(Settings::from_env());
}

fn init_logger() {
  if env::var_os("RUST_LOG").is_none() {
    env::set_var("RUST_LOG", "idgov=debug");
  }

  pretty_env_logger::init();
}

/// Entry point
#[tokio::main]
pub async fn main() {
  dotenv::dotenv().ok();

  init_logger();

  log::info!("{} v{} starting (birthright departments: {:?}, jira enabled: {})",
             STATE.settings.app_name,
             STATE.settings.version,
             STATE.settings.birthright_departments,
             STATE.settings.jira_enabled);

  let api = filters::api(filters::state_filter(&STATE)).with(warp::log("idgov"));

  warp::serve(api).run(([127, 0, 0, 1], 3030)).await;
}
