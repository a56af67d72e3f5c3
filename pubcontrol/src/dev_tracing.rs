/// Development helper: initialize a tracing subscriber when `RUST_LOG` is set.
///
/// Tests, benches and examples call `pubcontrol::dev_tracing::init_tracing()`
/// to see connect, publish and monitor events. No-op when `RUST_LOG` is unset
/// or a global subscriber is already installed, so calling it from every test
/// is fine.
pub fn init_tracing() {
    if std::env::var_os("RUST_LOG").is_some() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_thread_names(true)
            .with_test_writer()
            .try_init();
    }
}
