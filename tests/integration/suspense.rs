//! Placeholder racing tests

use ratchet::components::{delayed, suspense};
use ratchet::{Child, Component, Element};

use crate::support::*;

fn loading() -> Child {
    Child::from(Element::host("span").child("Loading..."))
}

fn tree(child_timeout: i64) -> Child {
    suspense()
        .element()
        .prop("fallback", loading())
        .prop("timeout", 100)
        .child(slow_child().element().prop("timeout", child_timeout))
        .into()
}

/// Async generator wrapping a fresh placeholder tree on every iteration.
fn app(
    slot: Slot,
    child_timeout: i64,
) -> Component {
    looping_async("App", move |ctx, _props| {
        slot.set(ctx);
        tree(child_timeout)
    })
}

fn frames(child: &str) -> Vec<String> {
    let loading = "<span>Loading...</span>".to_string();
    let child = format!("<span>{}</span>", child);
    vec![String::new(), loading.clone(), child.clone(), loading, child]
}

#[tokio::test(start_paused = true)]
async fn test_delayed_renders_children_late() {
    local(async {
        let (host, renderer, root) = mount();
        let settled = renderer
            .render(delayed().element().prop("timeout", 50).child("hi").into(), root)
            .unwrap();
        assert!(settled.is_pending());
        assert_eq!(host.html(root), "");
        settled.await.unwrap();
        assert_eq!(host.html(root), "hi");
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_fallback_then_children() {
    local(async {
        let (host, renderer, root) = mount();
        settle(renderer.render(tree(200), root)).await.unwrap();
        assert_eq!(host.html(root), "<span>Loading...</span>");
        sleep_ms(110).await;
        assert_eq!(host.html(root), "<span>Child 200</span>");
        assert_eq!(
            host.history(root),
            vec![
                "".to_string(),
                "<span>Loading...</span>".to_string(),
                "<span>Child 200</span>".to_string(),
            ]
        );
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_fast_children_skip_fallback() {
    local(async {
        let (host, renderer, root) = mount();
        settle(renderer.render(tree(50), root)).await.unwrap();
        assert_eq!(host.html(root), "<span>Child 50</span>");
        sleep_ms(110).await;
        assert_eq!(host.html(root), "<span>Child 50</span>");
        assert_eq!(
            host.history(root),
            vec!["".to_string(), "<span>Child 50</span>".to_string()]
        );
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_rerender_never_flickers_back_to_fallback() {
    local(async {
        let (host, renderer, root) = mount();
        settle(renderer.render(tree(150), root)).await.unwrap();
        assert_eq!(host.html(root), "<span>Loading...</span>");

        // the first children land at +50, before the second fallback fires
        settle(renderer.render(tree(150), root)).await.unwrap();
        sleep_ms(20).await;
        assert_eq!(host.html(root), "<span>Child 150</span>");
        assert_eq!(
            host.history(root),
            vec![
                "".to_string(),
                "<span>Loading...</span>".to_string(),
                "<span>Child 150</span>".to_string(),
            ]
        );
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_refresh_shows_fallback_again() {
    local(async {
        let (host, renderer, root) = mount();
        let slot = Slot::default();
        settle(renderer.render(app(slot.clone(), 200).element().into(), root))
            .await
            .unwrap();
        assert_eq!(host.html(root), "<span>Loading...</span>");
        sleep_ms(101).await;
        assert_eq!(host.html(root), "<span>Child 200</span>");

        settle(slot.get().refresh()).await.unwrap();
        assert_eq!(host.html(root), "<span>Loading...</span>");
        sleep_ms(101).await;
        assert_eq!(host.html(root), "<span>Child 200</span>");
        assert_eq!(host.history(root), frames("Child 200"));
    })
    .await;
}

// With 150ms children, every fallback restarted by a queued refresh fires
// after the children of the refresh before it.

#[tokio::test(start_paused = true)]
async fn test_concurrent_refreshes() {
    local(async {
        let (host, renderer, root) = mount();
        let slot = Slot::default();
        settle(renderer.render(app(slot.clone(), 150).element().into(), root))
            .await
            .unwrap();
        sleep_ms(60).await;
        assert_eq!(host.html(root), "<span>Child 150</span>");

        let ctx = slot.get();
        let first = ctx.refresh().unwrap();
        let second = ctx.refresh().unwrap();
        first.await.unwrap();
        assert_eq!(host.html(root), "<span>Loading...</span>");
        sleep_ms(101).await;
        assert_eq!(host.html(root), "<span>Child 150</span>");
        second.await.unwrap();
        assert_eq!(host.html(root), "<span>Child 150</span>");
        assert_eq!(host.history(root), frames("Child 150"));
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_refresh_from_another_task() {
    local(async {
        let (host, renderer, root) = mount();
        let slot = Slot::default();
        settle(renderer.render(app(slot.clone(), 150).element().into(), root))
            .await
            .unwrap();
        sleep_ms(60).await;

        let ctx = slot.get();
        let first = ctx.refresh().unwrap();
        let other = ctx.clone();
        tokio::task::spawn_local(async move {
            let _ = settle(other.refresh()).await;
        });
        first.await.unwrap();
        assert_eq!(host.html(root), "<span>Loading...</span>");
        sleep_ms(110).await;
        assert_eq!(host.html(root), "<span>Child 150</span>");
        assert_eq!(host.history(root), frames("Child 150"));
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_refresh_after_refresh_fulfills() {
    local(async {
        let (host, renderer, root) = mount();
        let slot = Slot::default();
        settle(renderer.render(app(slot.clone(), 150).element().into(), root))
            .await
            .unwrap();
        sleep_ms(60).await;

        let ctx = slot.get();
        settle(ctx.refresh()).await.unwrap();
        assert_eq!(host.html(root), "<span>Loading...</span>");
        // the children of the first refresh still land while the second runs
        settle(ctx.refresh()).await.unwrap();
        assert_eq!(host.html(root), "<span>Child 150</span>");
        assert_eq!(host.history(root), frames("Child 150"));
    })
    .await;
}
