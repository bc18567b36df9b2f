use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::bail;
use async_trait::async_trait;
use futures::channel::oneshot;
use serde_json::{json, Value};

use mapclay::prelude::*;

/// Scheduler tests driving whole batches through preparation and steps
#[cfg(test)]
mod render_tests {
    use super::*;

    const LEAFLET: &str = "renderers/leaflet";
    const PRESET_URL: &str = "https://example.com/base-config.yaml";

    /// Provider with a map step, a dependent step and an independent one
    struct StubProvider {
        fail_map: bool,
        dependent_calls: Arc<AtomicUsize>,
    }

    impl StubProvider {
        fn new(fail_map: bool, dependent_calls: Arc<AtomicUsize>) -> Self {
            Self {
                fail_map,
                dependent_calls,
            }
        }
    }

    impl StepProvider for StubProvider {
        fn id(&self) -> &str {
            "stub"
        }

        fn steps(&self) -> Vec<Arc<dyn Step>> {
            let fail_map = self.fail_map;
            let calls = self.dependent_calls.clone();
            vec![
                step_fn("add_map", move |renderer| {
                    if fail_map {
                        bail!("map library missing");
                    }
                    renderer.set_map(String::from("map"));
                    Ok(StepOutcome::done())
                }),
                FnStep::new("add_markers", move |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(StepOutcome::done())
                })
                .depends_on("add_map")
                .into_step(),
                step_fn("set_extra", |_| Ok(StepOutcome::Skip)),
            ]
        }
    }

    /// Module loader counting how often a renderer is materialized
    struct CountingLoader {
        registry: RendererRegistry,
        loads: AtomicUsize,
    }

    impl CountingLoader {
        fn new(registry: RendererRegistry) -> Arc<Self> {
            Arc::new(Self {
                registry,
                loads: AtomicUsize::new(0),
            })
        }

        fn loads(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModuleLoader for CountingLoader {
        async fn load(&self, specifier: &str) -> mapclay::Result<Arc<dyn StepProvider>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.registry.load(specifier).await
        }
    }

    fn registry(calls: &Arc<AtomicUsize>) -> RendererRegistry {
        let calls = calls.clone();
        RendererRegistry::new().with(LEAFLET, move || {
            Arc::new(StubProvider::new(false, calls.clone())) as Arc<dyn StepProvider>
        })
    }

    fn scheduler(loader: Arc<CountingLoader>, fetcher: &MemoryFetcher) -> Mapclay {
        Mapclay::builder()
            .with_loader(loader)
            .with_fetcher(Arc::new(fetcher.clone()))
            .with_preset_cache(Arc::new(PresetCache::new()))
            .build()
    }

    fn prepare_states(renderer: &Renderer) -> Vec<(String, StepState)> {
        renderer
            .results
            .iter()
            .filter(|result| result.phase == Phase::Prepare)
            .map(|result| (result.step.clone(), result.state))
            .collect()
    }

    /// Rendering an unchanged, fulfilled batch twice materializes once
    #[tokio::test]
    async fn test_render_is_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = CountingLoader::new(registry(&calls));
        let mapclay = scheduler(loader.clone(), &MemoryFetcher::new());
        let container = Element::new("article");

        let mut configs = parse_configs("use: Leaflet\nzoom: 7").unwrap();
        let first = mapclay.render_all(&container, &mut configs).await;
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].status(), RenderStatus::Fulfilled);

        let second = mapclay.render_all(&container, &mut configs).await;
        assert!(second.is_empty());
        assert_eq!(loader.loads(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let children = container.children();
        assert_eq!(children.len(), 1);
        assert!(children[0].ptr_eq(configs[0].target.as_ref().unwrap()));
        assert_eq!(children[0].render_status(), Some(RenderStatus::Fulfilled));
    }

    /// A changed configuration re-renders into the same container
    #[tokio::test]
    async fn test_changed_config_rerenders_in_place() {
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = CountingLoader::new(registry(&calls));
        let mapclay = scheduler(loader.clone(), &MemoryFetcher::new());
        let container = Element::new("article");

        let mut configs = parse_configs("use: Leaflet\nzoom: 7").unwrap();
        mapclay.render_all(&container, &mut configs).await;
        let target = configs[0].target.clone().unwrap();

        configs[0].set("zoom", 9);
        let rendered = mapclay.render_all(&container, &mut configs).await;
        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered[0].option("zoom"), Some(&json!(9)));
        assert!(configs[0].target.as_ref().unwrap().ptr_eq(&target));
        assert_eq!(loader.loads(), 2);
    }

    /// The scenario from the configuration format: fingerprint and status
    #[tokio::test]
    async fn test_leaflet_scenario_fingerprint() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mapclay = scheduler(CountingLoader::new(registry(&calls)), &MemoryFetcher::new());
        let container = Element::new("article");

        let renderers = mapclay
            .render_by_yaml(&container, Some("use: Leaflet\ncenter: [121,24]\nzoom: 7"))
            .await
            .unwrap();
        assert_eq!(renderers.len(), 1);

        let children = container.children();
        let target = &children[0];
        let fingerprint: Value = serde_json::from_str(&target.fingerprint().unwrap()).unwrap();
        assert_eq!(
            fingerprint,
            json!({ "use": "Leaflet", "center": [121, 24], "zoom": 7, "width": "100%" })
        );
        assert!(target.has_class("mapclay"));
        assert_eq!(target.render_status(), Some(RenderStatus::Fulfilled));
    }

    /// An invalid sibling does not keep a valid one from rendering
    #[tokio::test]
    async fn test_batch_isolation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mapclay = scheduler(CountingLoader::new(registry(&calls)), &MemoryFetcher::new());
        let container = Element::new("article");

        let mut configs = parse_configs("id: broken\nuse: NoSuchRenderer\n---\nid: fine\nuse: Leaflet\n").unwrap();
        let renderers = mapclay.render_all(&container, &mut configs).await;
        assert_eq!(renderers.len(), 2);

        let broken = &renderers[0];
        assert_eq!(broken.status(), RenderStatus::Unfulfilled);
        assert_eq!(
            prepare_states(broken).last(),
            Some(&("prepare_renderer".to_string(), StepState::Stop))
        );
        assert!(matches!(
            broken.results.last().and_then(|r| r.error()).and_then(|e| e.downcast_ref::<MapclayError>()),
            Some(MapclayError::ModuleLoad { .. })
        ));

        let fine = &renderers[1];
        assert_eq!(fine.status(), RenderStatus::Fulfilled);

        let children = container.children();
        assert_eq!(children[0].id().as_deref(), Some("broken"));
        assert_eq!(children[0].render_status(), Some(RenderStatus::Unfulfilled));
        assert_eq!(children[1].id().as_deref(), Some("fine"));
        assert_eq!(children[1].render_status(), Some(RenderStatus::Fulfilled));
    }

    /// A failed preset fetch stops the render before any step runs
    #[tokio::test]
    async fn test_preparation_failure_stops_render() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mapclay = scheduler(CountingLoader::new(registry(&calls)), &MemoryFetcher::new());
        let container = Element::new("article");

        let mut configs = vec![Config::from_value(json!({ "use": "Leaflet", "apply": PRESET_URL }))];
        let renderers = mapclay.render_all(&container, &mut configs).await;

        let renderer = &renderers[0];
        assert_eq!(renderer.status(), RenderStatus::Unfulfilled);
        assert!(!renderer.has_steps());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            prepare_states(renderer),
            vec![
                ("set_value_by_aliases".to_string(), StepState::Success),
                ("apply_preset".to_string(), StepState::Stop),
            ]
        );
        assert!(renderer.failures().all(|r| r.phase == Phase::Prepare));
        assert_eq!(
            configs[0].target.as_ref().and_then(Element::render_status),
            Some(RenderStatus::Unfulfilled)
        );
    }

    /// A failed step skips the steps depending on it, and only those
    #[tokio::test]
    async fn test_dependency_skip() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = Arc::new(StubProvider::new(true, calls.clone()));
        let mapclay = Mapclay::builder().without_converter().build();
        let container = Element::new("article");

        let mut configs = vec![Config::default().with_renderer(provider)];
        let renderers = mapclay.render_all(&container, &mut configs).await;

        let renderer = &renderers[0];
        assert_eq!(renderer.state_of("add_map"), Some(StepState::Fail));
        assert_eq!(renderer.state_of("add_markers"), Some(StepState::Skip));
        assert_eq!(renderer.state_of("set_extra"), Some(StepState::Skip));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(renderer.status(), RenderStatus::Unfulfilled);
    }

    /// Without `use` or an explicit renderer the health check stops the render
    #[tokio::test]
    async fn test_missing_renderer_is_unhealthy() {
        let mapclay = Mapclay::builder().without_converter().build();
        let container = Element::new("article");

        let mut config = Config::from_value(json!({ "zoom": 3 }));
        let renderer = mapclay.render_one(&container, &mut config).await.unwrap();
        assert_eq!(
            prepare_states(&renderer).last(),
            Some(&("health_check".to_string(), StepState::Stop))
        );
        assert_eq!(renderer.status(), RenderStatus::Unfulfilled);
    }

    /// Presets merge underneath, and their aliases resolve on the second pass
    #[tokio::test]
    async fn test_applied_preset() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = MemoryFetcher::new().with_document(
            PRESET_URL,
            "zoom: 12\ncenter: [1, 2]\nuse: Remote\naliases:\n  use:\n    Remote: renderers/leaflet\n",
        );
        let mapclay = Mapclay::builder()
            .without_converter()
            .with_registry(registry(&calls))
            .with_fetcher(Arc::new(fetcher.clone()))
            .with_preset_cache(Arc::new(PresetCache::new()))
            .build();
        let container = Element::new("article");

        let mut configs = vec![
            Config::from_value(json!({ "apply": PRESET_URL, "zoom": 3 })),
            Config::from_value(json!({ "apply": PRESET_URL })),
        ];
        let renderers = mapclay.render_all(&container, &mut configs).await;

        assert_eq!(renderers[0].option("zoom"), Some(&json!(3)));
        assert_eq!(renderers[1].option("zoom"), Some(&json!(12)));
        for renderer in &renderers {
            assert_eq!(renderer.option("use"), Some(&json!(LEAFLET)));
            assert_eq!(renderer.status(), RenderStatus::Fulfilled);
        }
        assert_eq!(fetcher.fetch_count(), 1);
    }

    /// `preset: last` inherits the previous sibling's resolved options but its id
    #[tokio::test]
    async fn test_preset_last() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mapclay = Mapclay::builder()
            .without_converter()
            .with_registry(registry(&calls))
            .build();
        let container = Element::new("article");

        let mut configs =
            parse_configs("id: a\nuse: renderers/leaflet\nzoom: 5\n---\nid: b\npreset: last\nheight: 200px\n").unwrap();
        let renderers = mapclay.render_all(&container, &mut configs).await;

        let second = &renderers[1];
        assert_eq!(second.option("zoom"), Some(&json!(5)));
        assert_eq!(second.option("id"), Some(&json!("b")));
        assert_eq!(second.id(), Some("stub"));
        assert_eq!(second.status(), RenderStatus::Fulfilled);
        assert_eq!(container.children()[1].id().as_deref(), Some("b"));
    }

    /// A sibling inheriting from an unchanged, reused one still resolves it
    #[tokio::test]
    async fn test_preset_last_after_reused_sibling() {
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = CountingLoader::new(registry(&calls));
        let mapclay = Mapclay::builder()
            .without_converter()
            .with_loader(loader.clone())
            .build();
        let container = Element::new("article");

        let mut configs =
            parse_configs("use: renderers/leaflet\nzoom: 5\n---\npreset: last\n").unwrap();
        mapclay.render_all(&container, &mut configs).await;
        assert_eq!(loader.loads(), 2);

        configs[1].set("height", "120px");
        let renderers = mapclay.render_all(&container, &mut configs).await;
        assert_eq!(renderers.len(), 1);
        assert_eq!(renderers[0].option("zoom"), Some(&json!(5)));
        assert_eq!(renderers[0].status(), RenderStatus::Fulfilled);
        assert_eq!(loader.loads(), 3);
    }

    /// `preset: last` cannot inherit from a sibling that failed to resolve
    #[tokio::test]
    async fn test_preset_last_after_failed_sibling() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mapclay = Mapclay::builder()
            .without_converter()
            .with_registry(registry(&calls))
            .with_fetcher(Arc::new(MemoryFetcher::new()))
            .with_preset_cache(Arc::new(PresetCache::new()))
            .build();
        let container = Element::new("article");

        let mut configs = vec![
            Config::from_value(json!({ "apply": PRESET_URL })),
            Config::from_value(json!({ "preset": "last", "use": LEAFLET })),
        ];
        let renderers = mapclay.render_all(&container, &mut configs).await;

        assert_eq!(
            prepare_states(&renderers[1]).last(),
            Some(&("await_preceding".to_string(), StepState::Stop))
        );
        assert_eq!(renderers[1].status(), RenderStatus::Unfulfilled);
    }

    /// Resolution without rendering, as used by the command line
    #[tokio::test]
    async fn test_resolve_batch() {
        let mapclay = Mapclay::builder()
            .with_preset_cache(Arc::new(PresetCache::new()))
            .with_fetcher(Arc::new(MemoryFetcher::new()))
            .build();
        let configs = parse_configs("zoom: 4\n---\npreset: last\nuse: Maplibre\n---\napply: https://nowhere.example/x.yaml\n---\npreset: last\n").unwrap();

        let resolved = mapclay.resolve(&configs).await;
        assert_eq!(resolved.len(), 4);

        let first = resolved[0].as_ref().unwrap();
        assert_eq!(first.get_str("use"), Some(LEAFLET));
        assert_eq!(first.get_str("width"), Some("100%"));

        let second = resolved[1].as_ref().unwrap();
        assert_eq!(second.get_str("use"), Some("renderers/maplibre"));
        assert_eq!(second.get("zoom"), Some(&json!(4)));

        assert!(matches!(resolved[2], Err(MapclayError::PresetFetch { .. })));
        assert!(matches!(resolved[3], Err(MapclayError::PrecedingConfigUnavailable)));
    }

    /// A step that waits for a gate, failing when told the render is stale
    struct Gate {
        slot: Arc<Mutex<Option<oneshot::Receiver<bool>>>>,
    }

    #[async_trait]
    impl Step for Gate {
        fn name(&self) -> &str {
            "gate"
        }

        async fn run(&self, _renderer: &mut Renderer) -> anyhow::Result<StepOutcome> {
            let receiver = self.slot.lock().unwrap().take();
            if let Some(receiver) = receiver {
                if !receiver.await? {
                    bail!("released as stale");
                }
            }
            Ok(StepOutcome::done())
        }
    }

    struct Gated {
        slot: Arc<Mutex<Option<oneshot::Receiver<bool>>>>,
    }

    impl StepProvider for Gated {
        fn id(&self) -> &str {
            "gated"
        }

        fn steps(&self) -> Vec<Arc<dyn Step>> {
            vec![Arc::new(Gate {
                slot: self.slot.clone(),
            })]
        }
    }

    /// A stale render finishing late does not overwrite the newer status
    #[tokio::test]
    async fn test_stale_render_does_not_settle() {
        let (release, gate) = oneshot::channel();
        let provider = Arc::new(Gated {
            slot: Arc::new(Mutex::new(Some(gate))),
        });
        let mapclay = Mapclay::builder().without_converter().build();
        let container = Element::new("article");

        let mut stale = vec![Config::from_value(json!({ "zoom": 1 })).with_renderer(provider.clone())];
        let mut pending = mapclay.render(&container, &mut stale).pop().unwrap();
        assert!(futures::poll!(pending.as_mut()).is_pending());

        let target = container.children()[0].clone();
        assert_eq!(target.render_status(), Some(RenderStatus::Rendering));

        let mut fresh = vec![Config::from_value(json!({ "zoom": 2 }))
            .with_renderer(provider)
            .with_target(target.clone())];
        let renderers = mapclay.render_all(&container, &mut fresh).await;
        assert_eq!(renderers[0].status(), RenderStatus::Fulfilled);
        assert_eq!(target.render_status(), Some(RenderStatus::Fulfilled));

        release.send(false).unwrap();
        let stale_renderer = pending.await;
        assert_eq!(stale_renderer.status(), RenderStatus::Unfulfilled);
        assert_eq!(target.render_status(), Some(RenderStatus::Fulfilled));
        assert_eq!(target.fingerprint(), Some(fresh[0].fingerprint()));
    }

    /// Provider whose only step never completes
    struct Hanging;

    #[async_trait]
    impl Step for Hanging {
        fn name(&self) -> &str {
            "add_map"
        }

        async fn run(&self, _renderer: &mut Renderer) -> anyhow::Result<StepOutcome> {
            futures::future::pending::<()>().await;
            Ok(StepOutcome::done())
        }
    }

    impl StepProvider for Hanging {
        fn id(&self) -> &str {
            "hanging"
        }

        fn steps(&self) -> Vec<Arc<dyn Step>> {
            vec![Arc::new(Hanging)]
        }
    }

    /// Each entry settles on its own, whatever its siblings do
    #[tokio::test]
    async fn test_siblings_settle_independently() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mapclay = Mapclay::builder().without_converter().build();
        let container = Element::new("article");

        let mut configs = vec![
            Config::from_value(json!({ "id": "slow" })).with_renderer(Arc::new(Hanging)),
            Config::from_value(json!({ "id": "fast" }))
                .with_renderer(Arc::new(StubProvider::new(false, calls.clone()))),
        ];
        let mut pending = mapclay.render(&container, &mut configs);
        assert_eq!(pending.len(), 2);

        let fast = pending.pop().unwrap().await;
        assert_eq!(fast.status(), RenderStatus::Fulfilled);
        assert_eq!(fast.state_of("add_markers"), Some(StepState::Success));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let mut slow = pending.pop().unwrap();
        assert!(futures::poll!(slow.as_mut()).is_pending());
        assert_eq!(
            configs[0].target.as_ref().and_then(Element::render_status),
            Some(RenderStatus::Rendering)
        );
    }

    /// `preset: last` resolves its sibling without waiting for it to render
    #[tokio::test]
    async fn test_preset_last_does_not_wait_for_sibling_render() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mapclay = Mapclay::builder()
            .without_converter()
            .with_registry(registry(&calls))
            .build();
        let container = Element::new("article");

        let mut configs = vec![
            Config::from_value(json!({ "id": "slow", "zoom": 5 })).with_renderer(Arc::new(Hanging)),
            Config::from_value(json!({ "id": "next", "preset": "last", "use": LEAFLET })),
        ];
        let mut pending = mapclay.render(&container, &mut configs);

        let next = pending.pop().unwrap().await;
        assert_eq!(next.option("zoom"), Some(&json!(5)));
        assert_eq!(next.option("id"), Some(&json!("next")));
        assert_eq!(next.status(), RenderStatus::Fulfilled);
        assert!(prepare_states(&next).contains(&("await_preceding".to_string(), StepState::Success)));
    }
}
