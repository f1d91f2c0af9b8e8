//! Scheduler unit tests
//!
//! Synchronous renders only; anything that needs a timer lives in the
//! integration suite.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::*;
use crate::runtime::component::{Component, Resume, Step};
use crate::runtime::context::Context;
use crate::runtime::element::{Element, Key};
use crate::runtime::host::MemoryHost;

fn mount() -> (MemoryHost, Renderer, HostId) {
    mount_with(EngineConfig::default())
}

fn mount_with(config: EngineConfig) -> (MemoryHost, Renderer, HostId) {
    let host = MemoryHost::new();
    let renderer = Renderer::with_config(host.clone(), config);
    let root = renderer.create_root();
    (host, renderer, root)
}

fn render_sync(
    renderer: &Renderer,
    tree: impl Into<Child>,
    root: HostId,
) -> RenderResult<()> {
    let settled = renderer.render(tree.into(), root)?;
    assert!(!settled.is_pending());
    Ok(())
}

fn creations(host: &MemoryHost) -> usize {
    host.effects()
        .iter()
        .filter(|effect| matches!(effect, HostEffect::Create { .. } | HostEffect::CreateText { .. }))
        .count()
}

fn list(keys: &[i64]) -> Child {
    Element::host("ul")
        .children(keys.iter().map(|k| Element::host("li").key(*k).child(*k)))
        .into()
}

mod render_tests {
    use super::*;

    #[test]
    fn test_host_tree() {
        let (host, renderer, root) = mount();
        render_sync(&renderer, Element::host("div").prop("class", "a").child("hi"), root).unwrap();
        assert_eq!(host.html(root), "<div class=\"a\">hi</div>");
    }

    #[test]
    fn test_updates_reuse_host_nodes() {
        let (host, renderer, root) = mount();
        render_sync(&renderer, Element::host("div").prop("class", "a").child("x"), root).unwrap();
        let created = creations(&host);
        render_sync(&renderer, Element::host("div").prop("class", "b").child("y"), root).unwrap();
        assert_eq!(host.html(root), "<div class=\"b\">y</div>");
        assert_eq!(creations(&host), created);
        assert!(host
            .effects()
            .iter()
            .any(|effect| matches!(effect, HostEffect::Update { .. })));
    }

    #[test]
    fn test_tag_change_remounts() {
        let (host, renderer, root) = mount();
        render_sync(&renderer, Element::host("div"), root).unwrap();
        render_sync(&renderer, Element::host("span"), root).unwrap();
        assert_eq!(host.html(root), "<span></span>");
        // root plus the span
        assert_eq!(host.node_count(), 2);
    }

    #[test]
    fn test_unknown_root() {
        let (_host, renderer, _root) = mount();
        let err = renderer
            .render(Child::from("x"), HostId(999))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::UnknownRoot(_))
        ));
        assert!(renderer.unmount(HostId(999)).is_err());
    }

    #[test]
    fn test_snapshot() {
        let (_host, renderer, root) = mount();
        render_sync(&renderer, vec![Child::from("a"), Child::Empty, Child::from("b")], root).unwrap();
        assert_eq!(
            renderer.snapshot(root),
            Some(Child::Fragment(vec![Child::from("a"), Child::from("b")]))
        );
    }

    #[test]
    fn test_function_runs_every_render() {
        let (host, renderer, root) = mount();
        let greet = Component::function("Greet", |_ctx, props| {
            Ok(format!("hello {}", props.str("name").unwrap_or("nobody")).into())
        });
        for name in ["a", "b", "c"] {
            render_sync(&renderer, greet.element().prop("name", name), root).unwrap();
        }
        assert_eq!(host.html(root), "hello c");
        assert_eq!(renderer.stats().executions(), 3);
    }
}

mod key_tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_duplicate_key_strict() {
        let (host, renderer, root) = mount();
        render_sync(&renderer, list(&[1, 2]), root).unwrap();
        let err = render_sync(&renderer, list(&[1, 1]), root).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::DuplicateKey { key: Key::Int(1), .. })
        ));
        assert!(err.is_fatal());
        assert_eq!(host.html(root), "<ul><li>1</li><li>2</li></ul>");
    }

    #[test]
    fn test_duplicate_key_lenient() {
        let config = EngineConfig {
            strict_keys: false,
            ..EngineConfig::default()
        };
        let (host, renderer, root) = mount_with(config);
        render_sync(&renderer, list(&[1, 1]), root).unwrap();
        assert_eq!(host.html(root), "<ul><li>1</li><li>1</li></ul>");
    }

    #[test]
    fn test_keyed_component_keeps_state() {
        let (host, renderer, root) = mount();
        let counter = Component::generator("Counter", |_ctx, props| {
            let label = props.str("label").unwrap_or_default().to_string();
            let mut renders = 0;
            move |_ctx: &Context, input: Resume| match input {
                Resume::Next(_) => {
                    renders += 1;
                    Step::Yield(format!("{}{}", label, renders).into())
                }
                Resume::Throw(err) => Step::Throw(err),
                Resume::Continue | Resume::Return => Step::Return(Child::Empty),
            }
        });
        let tree = |order: &[&str]| -> Child {
            order
                .iter()
                .map(|label| Child::from(counter.element().key(*label).prop("label", *label)))
                .collect::<Vec<_>>()
                .into()
        };
        render_sync(&renderer, tree(&["a", "b"]), root).unwrap();
        render_sync(&renderer, tree(&["b", "a"]), root).unwrap();
        assert_eq!(host.html(root), "b2a2");
    }

    proptest! {
        #[test]
        fn prop_keyed_reorder_moves_without_remounting(
            order in Just((0..8).collect::<Vec<i64>>()).prop_shuffle()
        ) {
            let (host, renderer, root) = mount();
            render_sync(&renderer, list(&(0..8).collect::<Vec<i64>>()), root).unwrap();
            let created = creations(&host);
            render_sync(&renderer, list(&order), root).unwrap();
            let expected: String = order.iter().map(|k| format!("<li>{}</li>", k)).collect();
            prop_assert_eq!(host.html(root), format!("<ul>{}</ul>", expected));
            prop_assert_eq!(creations(&host), created);
        }
    }
}

mod generator_tests {
    use super::*;

    #[test]
    fn test_refreshes_during_execution_coalesce() {
        let (host, renderer, root) = mount();
        let app = Component::generator("App", |_ctx, _props| {
            let mut renders = 0;
            move |ctx: &Context, input: Resume| match input {
                Resume::Next(_) => {
                    renders += 1;
                    if renders == 1 {
                        for _ in 0..3 {
                            let _ = ctx.refresh();
                        }
                    }
                    Step::Yield(Child::from(renders))
                }
                Resume::Throw(err) => Step::Throw(err),
                Resume::Continue | Resume::Return => Step::Return(Child::Empty),
            }
        });
        render_sync(&renderer, app.element(), root).unwrap();
        assert_eq!(host.html(root), "2");
        assert_eq!(renderer.stats().executions(), 2);
    }

    #[test]
    fn test_returned_generator_is_frozen() {
        let (host, renderer, root) = mount();
        let runs = Rc::new(Cell::new(0));
        let seen = runs.clone();
        let once = Component::generator("Once", move |_ctx, _props| {
            let runs = runs.clone();
            move |_ctx: &Context, input: Resume| match input {
                Resume::Next(props) => {
                    runs.set(runs.get() + 1);
                    Step::Return(Child::from(props.int("n").unwrap_or(0)))
                }
                Resume::Throw(err) => Step::Throw(err),
                Resume::Continue | Resume::Return => Step::Return(Child::Empty),
            }
        });
        render_sync(&renderer, once.element().prop("n", 1), root).unwrap();
        render_sync(&renderer, once.element().prop("n", 2), root).unwrap();
        assert_eq!(host.html(root), "1");
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn test_runaway_rethrow_loop_is_stopped() {
        let config = EngineConfig {
            max_resumptions: 8,
            ..EngineConfig::default()
        };
        let (_host, renderer, root) = mount_with(config);
        let bad = Component::function("Bad", |_ctx, _props| Err(RenderError::msg("always")));
        let app = Component::generator("App", move |_ctx, _props| {
            let bad = bad.clone();
            move |ctx: &Context, input: Resume| match input {
                Resume::Next(_) | Resume::Throw(_) => {
                    ctx.push_handler();
                    Step::Yield(bad.element().into())
                }
                Resume::Continue | Resume::Return => Step::Return(Child::Empty),
            }
        });
        let err = render_sync(&renderer, app.element(), root).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::RunawayGenerator { limit: 8, .. })
        ));
        assert!(renderer.stats().caught() >= 7);
    }
}

mod unmount_tests {
    use super::*;

    fn tracked(log: Rc<RefCell<Vec<&'static str>>>) -> Component {
        Component::generator("Tracked", move |ctx, _props| {
            let on_cleanup = log.clone();
            ctx.cleanup(move || on_cleanup.borrow_mut().push("cleanup"));
            let log = log.clone();
            move |_ctx: &Context, input: Resume| match input {
                Resume::Next(_) => Step::Yield(Element::host("p").child("live").into()),
                Resume::Return => {
                    log.borrow_mut().push("return");
                    Step::Return(Child::Empty)
                }
                Resume::Throw(err) => Step::Throw(err),
                Resume::Continue => Step::Return(Child::Empty),
            }
        })
    }

    #[test]
    fn test_replacing_returns_then_cleans_up() {
        let (host, renderer, root) = mount();
        let log = Rc::new(RefCell::new(Vec::new()));
        let component = tracked(log.clone());
        render_sync(&renderer, component.element(), root).unwrap();
        assert_eq!(host.html(root), "<p>live</p>");
        render_sync(&renderer, Child::Empty, root).unwrap();
        assert_eq!(host.html(root), "");
        assert_eq!(*log.borrow(), vec!["return", "cleanup"]);
        // root only
        assert_eq!(host.node_count(), 1);
    }

    #[test]
    fn test_unmount_root_runs_cleanups_once() {
        let (_host, renderer, root) = mount();
        let log = Rc::new(RefCell::new(Vec::new()));
        render_sync(&renderer, tracked(log.clone()).element(), root).unwrap();
        renderer.unmount(root).unwrap();
        renderer.unmount(root).unwrap_err();
        assert_eq!(*log.borrow(), vec!["return", "cleanup"]);
    }

    #[test]
    fn test_dropping_renderer_unmounts() {
        let log = Rc::new(RefCell::new(Vec::new()));
        {
            let (_host, renderer, root) = mount();
            render_sync(&renderer, tracked(log.clone()).element(), root).unwrap();
        }
        assert_eq!(*log.borrow(), vec!["return", "cleanup"]);
    }

    #[test]
    fn test_refresh_after_unmount_fails() {
        let (_host, renderer, root) = mount();
        let slot: Rc<RefCell<Option<Context>>> = Rc::new(RefCell::new(None));
        let keep = slot.clone();
        let app = Component::function("App", move |ctx, _props| {
            *keep.borrow_mut() = Some(ctx.clone());
            Ok(Child::from("app"))
        });
        render_sync(&renderer, app.element(), root).unwrap();
        render_sync(&renderer, Child::Empty, root).unwrap();
        let ctx = slot.borrow().clone().unwrap();
        assert!(ctx.is_unmounted());
        let err = ctx.refresh().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::Unmounted(_))
        ));
    }
}
