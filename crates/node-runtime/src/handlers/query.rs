//! # Query Handler
//!
//! Answers ABCI queries against the last committed state.
//!
//! Paths are `"<route>/<endpoint>"` and go to the module registered for
//! `route`, except the `app/` prefix which the application answers itself.

use ls_01_store::Context;
use ls_04_orchestrator::{ModuleError, QueryRouter};
use shared_types::{RequestQuery, ResponseQuery};
use tracing::debug;

const APP_PREFIX: &str = "app/";

pub fn handle_query(router: &QueryRouter, ctx: &mut Context, req: &RequestQuery) -> ResponseQuery {
    let height = ctx.height();
    let result = match req.path.strip_prefix(APP_PREFIX) {
        Some(endpoint) => app_query(ctx, endpoint),
        None => router.query(ctx, &req.path, &req.data),
    };
    match result {
        Ok(value) => ResponseQuery {
            value,
            height,
            ..Default::default()
        },
        Err(e) => {
            debug!(path = %req.path, error = %e, "[query] failed");
            ResponseQuery {
                code: e.code(),
                log: e.to_string(),
                height,
                ..Default::default()
            }
        }
    }
}

fn app_query(ctx: &mut Context, endpoint: &str) -> Result<Vec<u8>, ModuleError> {
    match endpoint {
        "height" => Ok(ctx.height().to_string().into_bytes()),
        "chain_id" => Ok(ctx.chain_id().as_bytes().to_vec()),
        other => Err(ModuleError::UnknownRoute(format!("app/{other}"))),
    }
}
