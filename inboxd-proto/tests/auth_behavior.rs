//! End-to-end SASL PLAIN auth behavior: token decode through to the
//! `ImapHooks::on_auth` outcome a front-end would act on.

use inboxd_proto::hooks::{AuthError, AuthOutcome, ImapHooks};
use inboxd_proto::sasl::{decode_plain, SaslError};
use inboxd_store::{gen_ident, UniqueIdent};

struct SingleUser {
    username: &'static str,
    password: &'static str,
    id: UniqueIdent,
}

#[async_trait::async_trait]
impl ImapHooks for SingleUser {
    async fn on_auth(&self, _authzid: &str, authcid: &str, password: &str, _session: &str) -> Result<AuthOutcome, AuthError> {
        if authcid == self.username && password == self.password {
            Ok(AuthOutcome { user: self.id })
        } else {
            Err(AuthError::AuthFailed)
        }
    }

    async fn on_open(
        &self,
        _user: UniqueIdent,
        _path: &str,
        _session: &str,
    ) -> Result<inboxd_proto::hooks::OpenOutcome, inboxd_collections::error::MailboxError> {
        unimplemented!("not exercised by this test")
    }

    async fn on_copy(
        &self,
        _user: UniqueIdent,
        _source: &str,
        _destination: &str,
        _uids: Vec<inboxd_collections::model::ImapUid>,
        _session: &str,
    ) -> Result<inboxd_proto::hooks::CopyOutcome, inboxd_proto::hooks::CopyError> {
        unimplemented!("not exercised by this test")
    }

    async fn on_delete(&self, _user: UniqueIdent, _path: &str) -> Result<(), inboxd_collections::error::MailboxError> {
        unimplemented!("not exercised by this test")
    }

    async fn on_unsubscribe(&self, _user: UniqueIdent, _path: &str) -> Result<(), inboxd_collections::error::MailboxError> {
        unimplemented!("not exercised by this test")
    }

    async fn on_get_quota_root(&self, _user: UniqueIdent) -> Result<inboxd_collections::model::QuotaRoot, inboxd_collections::error::HandlerError> {
        unimplemented!("not exercised by this test")
    }
}

/// TLS gating is a one-line caller concern, not part of `decode_plain` or
/// `ImapHooks` — this is the documented contract a front-end implements.
fn require_tls(tls_active: bool) -> Result<(), AuthError> {
    if tls_active {
        Ok(())
    } else {
        Err(AuthError::AuthRequiresTls)
    }
}

#[tokio::test]
async fn successful_auth_with_tls_active() {
    let hooks = SingleUser {
        username: "alice",
        password: "hunter2",
        id: gen_ident(),
    };
    let token = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, "\0alice\0hunter2");

    require_tls(true).unwrap();
    let creds = decode_plain(&token).unwrap();
    let outcome = hooks.on_auth(&creds.authzid, &creds.authcid, &creds.password, "sess-1").await.unwrap();
    assert_eq!(outcome.user, hooks.id);
}

#[tokio::test]
async fn auth_rejected_without_tls_before_token_is_even_decoded() {
    assert!(matches!(require_tls(false), Err(AuthError::AuthRequiresTls)));
}

#[tokio::test]
async fn malformed_token_is_a_bad_argument() {
    assert_eq!(decode_plain("AAA"), Err(SaslError::BadArgument));
}

#[tokio::test]
async fn wrong_password_fails_auth_after_a_successful_decode() {
    let hooks = SingleUser {
        username: "alice",
        password: "hunter2",
        id: gen_ident(),
    };
    let token = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, "\0alice\0wrong");
    let creds = decode_plain(&token).unwrap();
    let result = hooks.on_auth(&creds.authzid, &creds.authcid, &creds.password, "sess-1").await;
    assert!(matches!(result, Err(AuthError::AuthFailed)));
}
