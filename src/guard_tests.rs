use super::*;
use crate::identity::Identity;
use proptest::prelude::*;

fn anon() -> Session { Session::anonymous() }
fn user(role: &str) -> Session { Session::authenticated("t", Some("r".into()), Identity::new("u").with_role(role)) }
fn admin() -> Session { Session::authenticated("t", None, Identity::new("root").with_admin_flag(true)) }

#[test]
fn normalize_path_variants() {
    assert_eq!(normalize_path(""), "/");
    assert_eq!(normalize_path("/"), "/");
    assert_eq!(normalize_path("///"), "/");
    assert_eq!(normalize_path("/Dashboard/"), "/dashboard");
    assert_eq!(normalize_path("/reset-password?token=abc#top"), "/reset-password");
    assert_eq!(normalize_path("login"), "/login");
    assert_eq!(normalize_path("?next=/x"), "/");
}

#[test]
fn access_state_derivation() {
    assert_eq!(AccessState::derive(&anon()), AccessState::Anonymous);
    assert_eq!(AccessState::derive(&user("viewer")), AccessState::AuthenticatedUser { privileged: false });
    assert_eq!(AccessState::derive(&user("publisher")), AccessState::AuthenticatedUser { privileged: true });
    assert_eq!(AccessState::derive(&user("BlueVisionAdmin")), AccessState::AuthenticatedAdmin);
    assert_eq!(AccessState::derive(&admin()), AccessState::AuthenticatedAdmin);
}

#[test]
fn login_redirects_every_authenticated_role() {
    let g = RouteGuard::default();
    for s in [user("viewer"), user("publisher"), user(""), admin()] {
        for p in ["/login", "/forgot-password", "/reset-password?token=1"] {
            assert_eq!(g.guard(&s, p), AccessDecision::RedirectToDashboard, "{} {:?}", p, s.identity());
        }
    }
    assert_eq!(g.guard(&anon(), "/login"), AccessDecision::Allow);
}

#[test]
fn registration_allows_anonymous_and_admin_only() {
    let g = RouteGuard::default();
    assert_eq!(g.guard(&anon(), "/register"), AccessDecision::Allow);
    assert_eq!(g.guard(&admin(), "/register"), AccessDecision::Allow);
    assert_eq!(g.guard(&user("viewer"), "/register"), AccessDecision::RedirectToDashboard);
    assert_eq!(g.guard(&user("publisher"), "/register"), AccessDecision::RedirectToDashboard);
}

#[test]
fn user_management_is_admin_only() {
    let g = RouteGuard::default();
    assert_eq!(g.guard(&anon(), "/user-management"), AccessDecision::RedirectToLogin);
    assert_eq!(g.guard(&user("viewer"), "/user-management"), AccessDecision::RedirectToDashboard);
    assert_eq!(g.guard(&user("publisher"), "/user-management"), AccessDecision::RedirectToDashboard);
    assert_eq!(g.guard(&admin(), "/user-management"), AccessDecision::Allow);
}

#[test]
fn trust_management_follows_policy() {
    let permissive = RouteGuard::default();
    assert_eq!(permissive.guard(&anon(), "/trust-management"), AccessDecision::RedirectToLogin);
    assert_eq!(permissive.guard(&user("viewer"), "/trust-management"), AccessDecision::RedirectToDashboard);
    assert_eq!(permissive.guard(&user("publisher"), "/trust-management"), AccessDecision::Allow);
    assert_eq!(permissive.guard(&admin(), "/trust-management"), AccessDecision::Allow);

    let strict = RouteGuard::new(RouteTable::default(), TrustPolicy::AdminOnly);
    assert_eq!(strict.guard(&user("publisher"), "/trust-management"), AccessDecision::RedirectToDashboard);
    assert_eq!(strict.guard(&admin(), "/trust-management"), AccessDecision::Allow);
}

#[test]
fn public_pages_always_render() {
    let g = RouteGuard::default();
    for s in [anon(), user("viewer"), admin()] {
        assert_eq!(g.guard(&s, "/"), AccessDecision::Allow);
        assert_eq!(g.guard(&s, "/about"), AccessDecision::Allow);
    }
}

#[test]
fn config_adds_routes_and_renames_targets() {
    let mut routes = RouteConfig::default();
    routes.login = "/signin".into();
    routes.extra.insert("/reports".into(), RouteCategory::Dashboard);
    let g = RouteGuard::from_config(&routes, TrustPolicy::PrivilegedRole);
    assert_eq!(g.guard(&anon(), "/signin"), AccessDecision::Allow);
    assert_eq!(g.guard(&user("viewer"), "/signin"), AccessDecision::RedirectToDashboard);
    assert_eq!(g.guard(&anon(), "/reports"), AccessDecision::RedirectToLogin);
    assert_eq!(AccessDecision::RedirectToLogin.redirect_target(&routes), Some("/signin"));
    assert_eq!(AccessDecision::Allow.redirect_target(&routes), None);
}

fn arb_session() -> impl Strategy<Value = Session> {
    prop_oneof![
        Just(Session::anonymous()),
        (proptest::option::of("[A-Za-z_-]{0,12}"), proptest::option::of(any::<bool>()), proptest::option::of(any::<bool>()))
            .prop_map(|(role, a, s)| {
                let mut id = Identity::new("p");
                id.role = role;
                id.is_admin = a;
                id.is_staff = s;
                Session::authenticated("tok", None, id)
            }),
    ]
}

proptest! {
    #[test]
    fn unknown_paths_redirect_to_root(sess in arb_session(), tail in "[a-z0-9]{1,10}") {
        let g = RouteGuard::default();
        let path = format!("/unknown-{}", tail);
        prop_assert_eq!(g.guard(&sess, &path), AccessDecision::RedirectToRoot);
    }

    #[test]
    fn guard_is_total_over_arbitrary_paths(sess in arb_session(), path in ".{0,40}") {
        // every input maps to exactly one decision without panicking
        let _ = RouteGuard::default().guard(&sess, &path);
    }

    #[test]
    fn authenticated_sessions_never_see_login(sess in arb_session()) {
        let d = RouteGuard::default().guard(&sess, "/login");
        if sess.is_authenticated() {
            prop_assert_eq!(d, AccessDecision::RedirectToDashboard);
        } else {
            prop_assert_eq!(d, AccessDecision::Allow);
        }
    }
}
