#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use anyhow::anyhow;

    use crate::cache::{BootstrappingTokenSource, CachingTokenSource, Token, TokenSource, TokenSourceError};
    use crate::storage::MemoryStorage;
    use crate::tests::common::{counting_refresher, token_in, SwitchSource};

    /// Bootstrapper answering `token` unless `failing` is set
    fn bootstrapper(
        calls: Arc<AtomicUsize>,
        failing: Arc<AtomicBool>,
        token: Token,
    ) -> impl Fn() -> std::future::Ready<anyhow::Result<Token>> + Send + Sync {
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            if failing.load(Ordering::SeqCst) {
                std::future::ready(Err(anyhow!("network unreachable")))
            } else {
                std::future::ready(Ok(token.clone()))
            }
        }
    }

    #[tokio::test]
    async fn bootstrap_failure_on_empty_source_keeps_it_empty() {
        let boots = Arc::new(AtomicUsize::new(0));
        let built = Arc::new(AtomicUsize::new(0));
        let built_in_factory = built.clone();
        let source = BootstrappingTokenSource::new(
            bootstrapper(boots.clone(), Arc::new(AtomicBool::new(true)), Token::default()),
            move |token: Token| {
                built_in_factory.fetch_add(1, Ordering::SeqCst);
                SwitchSource::new(token)
            },
        );

        let err = source.token_ex().await.unwrap_err();

        assert!(matches!(err, TokenSourceError::BootstrapFailed(_)));
        assert!(err.to_string().contains("network unreachable"));
        assert!(!source.is_holding().await);
        assert_eq!(boots.load(Ordering::SeqCst), 1);
        assert_eq!(built.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn first_call_bootstraps_then_reuses_held_source() {
        let boots = Arc::new(AtomicUsize::new(0));
        let source = BootstrappingTokenSource::new(
            bootstrapper(boots.clone(), Arc::new(AtomicBool::new(false)), token_in("seed", 3600, "r1")),
            |token: Token| SwitchSource::new(token),
        );

        assert_eq!(source.token_ex().await.unwrap().access_token, "seed");
        assert!(source.is_holding().await);
        assert_eq!(source.token().await.unwrap().access_token, "seed");
        assert_eq!(boots.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_held_source_is_rebuilt_once() {
        let boots = Arc::new(AtomicUsize::new(0));
        let built = Arc::new(AtomicUsize::new(0));
        let built_in_factory = built.clone();

        let held = SwitchSource::new(token_in("old", 3600, "r0"));
        held.fail(true);
        let source = BootstrappingTokenSource::with_source(
            bootstrapper(boots.clone(), Arc::new(AtomicBool::new(false)), token_in("new", 3600, "r1")),
            move |token: Token| {
                built_in_factory.fetch_add(1, Ordering::SeqCst);
                SwitchSource::new(token)
            },
            held.clone(),
        );

        let got = source.token_ex().await.unwrap();

        assert_eq!(got.access_token, "new");
        assert_eq!(held.calls.load(Ordering::SeqCst), 1);
        assert_eq!(boots.load(Ordering::SeqCst), 1);
        assert_eq!(built.load(Ordering::SeqCst), 1);

        // replaced, the failing source is never asked again
        source.token_ex().await.unwrap();
        assert_eq!(held.calls.load(Ordering::SeqCst), 1);
        assert_eq!(boots.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rebuilt_source_failure_clears_and_next_call_bootstraps_again() {
        let boots = Arc::new(AtomicUsize::new(0));
        let built = Arc::new(AtomicUsize::new(0));
        let built_in_factory = built.clone();
        let rebuilt_fails = Arc::new(AtomicBool::new(true));
        let rebuilt_fails_in_factory = rebuilt_fails.clone();

        let source = BootstrappingTokenSource::new(
            bootstrapper(boots.clone(), Arc::new(AtomicBool::new(false)), token_in("seed", 3600, "r1")),
            move |token: Token| {
                built_in_factory.fetch_add(1, Ordering::SeqCst);
                let inner = SwitchSource::new(token);
                inner.fail(rebuilt_fails_in_factory.load(Ordering::SeqCst));
                inner
            },
        );

        let err = source.token_ex().await.unwrap_err();
        assert!(matches!(err, TokenSourceError::InnerSourceFailed(_)));
        assert!(!source.is_holding().await);
        assert_eq!(boots.load(Ordering::SeqCst), 1);
        assert_eq!(built.load(Ordering::SeqCst), 1);

        rebuilt_fails.store(false, Ordering::SeqCst);
        assert_eq!(source.token_ex().await.unwrap().access_token, "seed");
        assert!(source.is_holding().await);
        assert_eq!(boots.load(Ordering::SeqCst), 2);
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn bootstrap_failure_after_inner_failure_keeps_held_source() {
        let boots = Arc::new(AtomicUsize::new(0));
        let held = SwitchSource::new(token_in("old", 3600, "r0"));
        held.fail(true);
        let source = BootstrappingTokenSource::with_source(
            bootstrapper(boots.clone(), Arc::new(AtomicBool::new(true)), Token::default()),
            |token: Token| SwitchSource::new(token),
            held.clone(),
        );

        assert!(matches!(source.token_ex().await, Err(TokenSourceError::BootstrapFailed(_))));
        assert!(source.is_holding().await);

        // the held chain recovers on its own, no bootstrap needed
        held.fail(false);
        assert_eq!(source.token_ex().await.unwrap().access_token, "old");
        assert_eq!(boots.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rebuilds_refreshing_chain_when_refresh_token_is_dead() {
        let boots = Arc::new(AtomicUsize::new(0));
        let refreshes = Arc::new(AtomicUsize::new(0));
        let refreshes_in_factory = refreshes.clone();

        // every chain starts with an almost expired token and a refresher that fails
        let source = BootstrappingTokenSource::new(
            bootstrapper(boots.clone(), Arc::new(AtomicBool::new(false)), token_in("seed", 10, "r1")),
            move |token: Token| CachingTokenSource::new(Some(token), counting_refresher(refreshes_in_factory.clone(), None)),
        );

        let err = source.token_ex().await.unwrap_err();
        match err {
            TokenSourceError::InnerSourceFailed(inner) => {
                assert!(matches!(*inner, TokenSourceError::RefreshFailed(_)))
            }
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
        assert!(!source.is_holding().await);
    }

    #[tokio::test]
    async fn refreshing_chain_survives_while_refresh_works() {
        let boots = Arc::new(AtomicUsize::new(0));
        let refreshes = Arc::new(AtomicUsize::new(0));
        let refreshes_in_factory = refreshes.clone();

        let source = BootstrappingTokenSource::new(
            bootstrapper(boots.clone(), Arc::new(AtomicBool::new(false)), token_in("seed", 10, "r1")),
            move |token: Token| {
                CachingTokenSource::new(
                    Some(token),
                    counting_refresher(refreshes_in_factory.clone(), Some(token_in("a2", 3600, ""))),
                )
            },
        );

        let got = source.token_ex().await.unwrap();
        assert_eq!(got.access_token, "a2");
        assert_eq!(got.refresh_token, "r1");
        source.token_ex().await.unwrap();
        assert_eq!(boots.load(Ordering::SeqCst), 1);
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn persist_failure_in_held_chain_forces_rebootstrap() {
        let boots = Arc::new(AtomicUsize::new(0));
        let refreshes = Arc::new(AtomicUsize::new(0));
        let refreshes_in_factory = refreshes.clone();
        let store = MemoryStorage::new();
        let store_in_factory = store.clone();

        // refreshed tokens stay due, so every call refreshes and saves
        let source = BootstrappingTokenSource::new(
            bootstrapper(boots.clone(), Arc::new(AtomicBool::new(false)), token_in("seed", 10, "r1")),
            move |token: Token| {
                CachingTokenSource::new(
                    Some(token),
                    counting_refresher(refreshes_in_factory.clone(), Some(token_in("a2", 10, ""))),
                )
                .with_storage(store_in_factory.clone())
            },
        );

        assert_eq!(source.token_ex().await.unwrap().access_token, "a2");
        assert_eq!(boots.load(Ordering::SeqCst), 1);
        assert_eq!(store.saves(), 1);

        // held chain refreshes but cannot store, so a whole new chain is built and fails the same way
        store.fail_saves(true);
        match source.token_ex().await.unwrap_err() {
            TokenSourceError::InnerSourceFailed(inner) => {
                assert!(matches!(*inner, TokenSourceError::PersistFailed(_)))
            }
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(boots.load(Ordering::SeqCst), 2);
        assert_eq!(refreshes.load(Ordering::SeqCst), 3);
        assert!(!source.is_holding().await);

        store.fail_saves(false);
        assert_eq!(source.token_ex().await.unwrap().access_token, "a2");
        assert_eq!(boots.load(Ordering::SeqCst), 3);
        assert!(source.is_holding().await);
        assert_eq!(store.saves(), 2);
    }
}
