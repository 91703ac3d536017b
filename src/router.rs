//! Object-action routing and generated usage text.
//!
//! A tool describes its whole command surface as a list of [`Route`]s. Each
//! route binds one object and an explicit list of action names (the first is
//! canonical, the rest are aliases) to a command value of the tool's own enum.
//! Resolution is exact: there is no prefix matching and no fallback route.

use crate::args::{ArgSpec, FlagSpec};
use crate::error::{SpecError, UsageError};
use crate::format::{FormatTable, Transform};
use std::collections::HashSet;

/// Name of the flag that carries a format selector.
pub const FORMAT_FLAG: &str = "--format";

#[derive(Debug)]
pub struct Route<C> {
    pub command: C,
    pub object: &'static str,
    pub actions: &'static [&'static str],
    pub description: &'static str,
    spec: ArgSpec,
    formats: FormatTable,
}

impl<C> Route<C> {
    /// Declares a route. `flags` uses the [`ArgSpec`] syntax.
    pub fn new(
        command: C,
        object: &'static str,
        actions: &'static [&'static str],
        flags: &str,
        description: &'static str,
    ) -> Result<Self, SpecError> {
        if actions.is_empty() {
            return Err(SpecError::EmptyRoute(object.to_string()));
        }
        Ok(Self {
            command,
            object,
            actions,
            description,
            spec: ArgSpec::parse(flags)?,
            formats: FormatTable::default(),
        })
    }

    /// Registers an output selector for this route.
    pub fn format(mut self, selector: &'static str, transform: Transform) -> Self {
        self.formats.insert(selector, transform);
        self
    }

    pub fn spec(&self) -> &ArgSpec {
        &self.spec
    }

    pub fn formats(&self) -> &FormatTable {
        &self.formats
    }

    fn line(&self) -> (String, String) {
        let mut left = format!("{} {}", self.object, self.actions.join("|"));
        let flags = self.spec.render();
        if !flags.is_empty() {
            left.push(' ');
            left.push_str(&flags);
        }
        let mut right = self.description.to_string();
        if !self.formats.is_empty() {
            right.push_str(&format!(" (formats: {})", self.formats.selectors().join(", ")));
        }
        (left, right)
    }
}

#[derive(Debug)]
pub struct Router<C> {
    tool: &'static str,
    routes: Vec<Route<C>>,
}

impl<C> Router<C> {
    /// Builds the route table, rejecting any ambiguous (object, action) pair.
    ///
    /// Routes that declare output selectors get an optional `--format` flag.
    pub fn new(tool: &'static str, routes: Vec<Route<C>>) -> Result<Self, SpecError> {
        let mut seen = HashSet::new();
        let mut compiled = Vec::with_capacity(routes.len());

        for mut route in routes {
            for action in route.actions {
                if !seen.insert((route.object, *action)) {
                    return Err(SpecError::DuplicateRoute {
                        object: route.object.to_string(),
                        action: action.to_string(),
                    });
                }
            }
            if !route.formats.is_empty() {
                route.spec = route.spec.with_flag(FlagSpec {
                    name: FORMAT_FLAG.to_string(),
                    required: false,
                    takes_value: true,
                })?;
            }
            compiled.push(route);
        }

        Ok(Self {
            tool,
            routes: compiled,
        })
    }

    /// Finds the route for `object action`.
    ///
    /// # Errors
    ///
    /// [`UsageError::UnknownObject`] when no route has that object, otherwise
    /// [`UsageError::UnknownAction`] when none of its routes has that action.
    pub fn resolve(&self, object: &str, action: &str) -> Result<&Route<C>, UsageError> {
        let mut object_known = false;
        for route in &self.routes {
            if route.object != object {
                continue;
            }
            object_known = true;
            if route.actions.iter().any(|a| *a == action) {
                return Ok(route);
            }
        }

        if object_known {
            Err(UsageError::UnknownAction {
                object: object.to_string(),
                action: action.to_string(),
            })
        } else {
            Err(UsageError::UnknownObject(object.to_string()))
        }
    }

    /// Usage text assembled from the route descriptions.
    pub fn usage(&self) -> String {
        let lines: Vec<(String, String)> = self.routes.iter().map(Route::line).collect();
        let width = lines.iter().map(|(l, _)| l.len()).max().unwrap_or(0);

        let mut out = format!("Usage: {} <object> <action> [flags]\n\nCommands:\n", self.tool);
        for (left, right) in lines {
            out.push_str(&format!("  {:<width$}  {}\n", left, right, width = width));
        }
        out.push_str("\nOptions:\n");
        out.push_str("  -h, --help     Print this usage text\n");
        out.push_str("  -v             Increase log verbosity (repeatable)\n");
        out.push_str("  -V, --version  Print version\n");
        out.push_str("  --config       Show where configuration is read from\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Cmd {
        UserList,
        UserAdd,
        GroupList,
    }

    fn router() -> Router<Cmd> {
        Router::new(
            "demo",
            vec![
                Route::new(Cmd::UserList, "user", &["list", "dir"], "[--base=]", "List users")
                    .unwrap()
                    .format("short", Transform::Raw)
                    .format("long", Transform::Raw),
                Route::new(Cmd::UserAdd, "user", &["add", "create"], "--name= [--mail=]", "Create a user")
                    .unwrap(),
                Route::new(Cmd::GroupList, "group", &["list"], "", "List groups").unwrap(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_canonical_and_alias_to_same_route() {
        let router = router();
        let list = router.resolve("user", "list").unwrap();
        let dir = router.resolve("user", "dir").unwrap();
        assert_eq!(list.command, Cmd::UserList);
        assert!(std::ptr::eq(list, dir));
    }

    #[test]
    fn test_resolve_unknown_object() {
        let err = router().resolve("computer", "list").unwrap_err();
        assert_eq!(err, UsageError::UnknownObject("computer".to_string()));
    }

    #[test]
    fn test_resolve_unknown_action_names_both_tokens() {
        let err = router().resolve("group", "dir").unwrap_err();
        assert_eq!(
            err,
            UsageError::UnknownAction {
                object: "group".to_string(),
                action: "dir".to_string()
            }
        );
    }

    #[test]
    fn test_resolve_rejects_prefixes() {
        let router = router();
        assert!(router.resolve("use", "list").is_err());
        assert!(router.resolve("user", "li").is_err());
        assert!(router.resolve("USER", "list").is_err());
    }

    #[test]
    fn test_duplicate_route_is_rejected() {
        let err = Router::new(
            "demo",
            vec![
                Route::new(Cmd::UserList, "user", &["list", "dir"], "", "List").unwrap(),
                Route::new(Cmd::GroupList, "user", &["dir"], "", "Also list").unwrap(),
            ],
        )
        .unwrap_err();
        assert_eq!(
            err,
            SpecError::DuplicateRoute {
                object: "user".to_string(),
                action: "dir".to_string()
            }
        );
    }

    #[test]
    fn test_route_without_actions_is_rejected() {
        let err = Route::new(Cmd::UserList, "user", &[], "", "Nothing").unwrap_err();
        assert_eq!(err, SpecError::EmptyRoute("user".to_string()));
    }

    #[test]
    fn test_routes_with_formats_accept_format_flag() {
        let router = router();
        let with = router.resolve("user", "list").unwrap();
        let without = router.resolve("group", "list").unwrap();

        let flag = with.spec().find(FORMAT_FLAG).unwrap();
        assert!(!flag.required);
        assert!(flag.takes_value);
        assert!(without.spec().find(FORMAT_FLAG).is_none());
    }

    #[test]
    fn test_explicit_format_flag_conflicts() {
        let err = Router::new(
            "demo",
            vec![
                Route::new(Cmd::UserList, "user", &["list"], "[--format=]", "List")
                    .unwrap()
                    .format("short", Transform::Raw),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, SpecError::DuplicateFlag { .. }));
    }

    #[test]
    fn test_usage_lists_every_route_with_description() {
        let usage = router().usage();

        assert!(usage.starts_with("Usage: demo <object> <action> [flags]"));
        assert!(usage.contains("user list|dir [--base=] [--format=]"));
        assert!(usage.contains("List users (formats: long, short)"));
        assert!(usage.contains("user add|create --name= [--mail=]"));
        assert!(usage.contains("Create a user"));
        assert!(usage.contains("group list"));
        assert!(usage.contains("List groups"));
    }
}
