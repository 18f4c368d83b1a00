//! Message and query routers, filled by `ModuleManager::register_routes`.

use crate::errors::{ManagerError, ManagerResult, ModuleError, ModuleResult};
use crate::module::AppModule;
use ls_01_store::Context;
use shared_types::Msg;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Routes a message to the module named by `Msg::route`.
#[derive(Default)]
pub struct MsgRouter {
    routes: BTreeMap<&'static str, Arc<dyn AppModule>>,
}

impl MsgRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_route(&mut self, route: &'static str, module: Arc<dyn AppModule>) -> ManagerResult<()> {
        if self.routes.contains_key(route) {
            return Err(ManagerError::DuplicateRoute(route.to_string()));
        }
        self.routes.insert(route, module);
        Ok(())
    }

    pub fn has_route(&self, route: &str) -> bool {
        self.routes.contains_key(route)
    }

    pub fn routes(&self) -> Vec<&'static str> {
        self.routes.keys().copied().collect()
    }

    pub fn dispatch(&self, ctx: &mut Context, msg: &Msg) -> ModuleResult<()> {
        let module = self
            .routes
            .get(msg.route())
            .ok_or_else(|| ModuleError::UnknownRoute(msg.route().to_string()))?;
        module.handle_msg(ctx, msg)
    }
}

/// Routes `"<route>/<rest>"` query paths.
#[derive(Default)]
pub struct QueryRouter {
    routes: BTreeMap<&'static str, Arc<dyn AppModule>>,
}

impl QueryRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_route(&mut self, route: &'static str, module: Arc<dyn AppModule>) -> ManagerResult<()> {
        if self.routes.contains_key(route) {
            return Err(ManagerError::DuplicateRoute(route.to_string()));
        }
        self.routes.insert(route, module);
        Ok(())
    }

    pub fn query(&self, ctx: &mut Context, path: &str, data: &[u8]) -> ModuleResult<Vec<u8>> {
        let path = path.trim_start_matches('/');
        let (route, rest) = path.split_once('/').unwrap_or((path, ""));
        let module = self
            .routes
            .get(route)
            .ok_or_else(|| ModuleError::UnknownRoute(route.to_string()))?;
        module.query(ctx, rest, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ls_01_store::{ExecMode, Snapshot, StateView, StoreKeyRegistry};
    use shared_types::{BlockHeader, MsgUnjail};

    struct Echo;

    impl AppModule for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn query_route(&self) -> Option<&'static str> {
            Some("echo")
        }

        fn query(&self, _ctx: &mut Context, path: &str, data: &[u8]) -> ModuleResult<Vec<u8>> {
            let mut out = path.as_bytes().to_vec();
            out.extend_from_slice(data);
            Ok(out)
        }
    }

    fn ctx() -> Context {
        Context::new(
            BlockHeader::default(),
            ExecMode::Query,
            StateView::new(Arc::new(Snapshot::default())),
            Arc::new(StoreKeyRegistry::new(&["main"], &[]).unwrap()),
        )
    }

    #[test]
    fn test_query_path_split() {
        let mut router = QueryRouter::new();
        router.add_route("echo", Arc::new(Echo)).unwrap();
        assert_eq!(router.query(&mut ctx(), "/echo/balance", b":x").unwrap(), b"balance:x");
        assert!(matches!(
            router.query(&mut ctx(), "bank/balance", b""),
            Err(ModuleError::UnknownRoute(route)) if route == "bank"
        ));
    }

    #[test]
    fn test_unrouted_message() {
        let router = MsgRouter::new();
        let msg = Msg::Unjail(MsgUnjail {
            operator: Default::default(),
        });
        assert_eq!(
            router.dispatch(&mut ctx(), &msg),
            Err(ModuleError::UnknownRoute("slashing".into()))
        );
    }
}
