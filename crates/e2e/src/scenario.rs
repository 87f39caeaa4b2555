//! Built-in scenarios for the nll-light web app behind Keycloak

use crate::spec::{TestSpec, TestStep, WaitState, DEFAULT_REDIRECT_TIMEOUT_MS};

pub const LOGIN_SCENARIO: &str = "login-via-keycloak";
pub const LOGOUT_SCENARIO: &str = "logout-after-login";

/// Visible label of the federated login trigger on the app's login page
pub const LOGIN_TRIGGER: &str = "text=Logga in med Keycloak";
/// Visible label of the logout affordance shown once logged in
pub const LOGOUT_LABEL: &str = "text=Logga ut";

pub const USERNAME_INPUT: &str = r#"input[name="username"], input#username"#;
pub const PASSWORD_INPUT: &str = r#"input[name="password"], input#password"#;
pub const SUBMIT_BUTTON: &str = r#"button[type="submit"]"#;

/// Where the app sends the browser after the IdP session is ended
pub const LOGGED_OUT_PATH: &str = "/login?logout";

fn login_steps() -> Vec<TestStep> {
    vec![
        TestStep::Navigate { url: "/".into() },
        TestStep::ExpectUrl { url: "/".into() },
        TestStep::Click { selector: LOGIN_TRIGGER.into(), timeout_ms: None },
        TestStep::Wait {
            selector: USERNAME_INPUT.into(),
            timeout_ms: None,
            state: WaitState::Visible,
        },
        TestStep::Fill { selector: USERNAME_INPUT.into(), value: "${username}".into() },
        TestStep::Fill { selector: PASSWORD_INPUT.into(), value: "${password}".into() },
        TestStep::Click { selector: SUBMIT_BUTTON.into(), timeout_ms: None },
        TestStep::WaitForUrl { prefix: None, timeout_ms: DEFAULT_REDIRECT_TIMEOUT_MS },
        TestStep::ExpectAny {
            selectors: vec![LOGOUT_LABEL.into(), "text=${username}".into()],
            min_count: 1,
        },
    ]
}

/// Load the app root, log in through Keycloak, and require a post-login
/// marker once the browser is back on the app origin.
pub fn login_via_keycloak() -> TestSpec {
    TestSpec {
        name: LOGIN_SCENARIO.into(),
        description: "Log in through Keycloak and land back on the application".into(),
        tags: vec!["auth".into(), "smoke".into()],
        viewport: None,
        steps: login_steps(),
    }
}

/// The login flow followed by a logout that must end the IdP session and
/// return to the app's logged-out page.
pub fn logout_after_login() -> TestSpec {
    let mut steps = login_steps();
    steps.push(TestStep::Click { selector: LOGOUT_LABEL.into(), timeout_ms: None });
    steps.push(TestStep::WaitForUrl {
        prefix: Some(format!("${{base_url}}{}", LOGGED_OUT_PATH)),
        timeout_ms: DEFAULT_REDIRECT_TIMEOUT_MS,
    });

    TestSpec {
        name: LOGOUT_SCENARIO.into(),
        description: "Log in, log out, and land on the logged-out page".into(),
        tags: vec!["auth".into()],
        viewport: None,
        steps,
    }
}
