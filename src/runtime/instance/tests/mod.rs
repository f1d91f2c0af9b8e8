//! Instance tree unit tests

use super::*;
use crate::runtime::component::{Resume, Step};
use crate::runtime::element::Element;
use crate::runtime::errors::RenderError;

fn node(
    id: usize,
    kind: NodeKind,
) -> NodeRef {
    Rc::new(RefCell::new(Node::new(InstanceId(id), None, Weak::new(), kind)))
}

fn text(
    id: usize,
    content: &str,
) -> NodeRef {
    node(
        id,
        NodeKind::Text {
            text: content.to_string(),
            committed: Some(content.to_string()),
        },
    )
}

fn component_node(
    id: usize,
    component: &Component,
) -> NodeRef {
    Rc::new_cyclic(|weak| {
        let ctx = Context::new(InstanceId(id), component.name(), weak.clone(), Weak::new());
        let inst = Instance::new(component.clone(), ctx, Props::new());
        RefCell::new(Node::new(
            InstanceId(id),
            None,
            Weak::new(),
            NodeKind::Component(Box::new(inst)),
        ))
    })
}

mod state_tests {
    use super::*;

    #[test]
    fn test_resting_states() {
        assert!(RenderState::Idle.is_resting());
        assert!(RenderState::AwaitingIteration.is_resting());
        assert!(RenderState::Errored.is_resting());
        assert!(!RenderState::Executing.is_resting());
        assert!(!RenderState::AwaitingAsync.is_resting());
        assert!(!RenderState::Unmounted.is_resting());
    }

    #[test]
    fn test_display() {
        assert_eq!(RenderState::AwaitingIteration.to_string(), "awaiting-iteration");
    }
}

mod execution_tests {
    use super::*;

    #[test]
    fn test_absorb_prefers_parent_origin() {
        let (tx1, _rx1) = oneshot::channel();
        let (tx2, _rx2) = oneshot::channel();
        let mut exec = Execution::new(Origin::Refresh);
        exec.absorb(Origin::Parent, tx1);
        assert_eq!(exec.origin, Origin::Parent);
        exec.absorb(Origin::Refresh, tx2);
        assert_eq!(exec.origin, Origin::Parent);
        assert_eq!(exec.waiters.len(), 2);
    }

    #[test]
    fn test_resolve_reaches_every_waiter() {
        let (tx1, mut rx1) = oneshot::channel();
        let (tx2, mut rx2) = oneshot::channel();
        let mut exec = Execution::new(Origin::Refresh);
        exec.waiters.push(tx1);
        exec.waiters.push(tx2);
        let err = RenderError::msg("boom");
        exec.resolve(Err(err.clone()));
        assert!(rx1.try_recv().unwrap().unwrap_err().same(&err));
        assert!(rx2.try_recv().unwrap().unwrap_err().same(&err));
    }

    #[test]
    fn test_pending_list_settles_once() {
        let (tx, mut rx) = oneshot::channel();
        let mut list = PendingList {
            seq: 1,
            interim: false,
            epoch: 0,
            nodes: Vec::new(),
            notify: Some(tx),
        };
        list.settle(Ok(()));
        list.settle(Err(RenderError::msg("late")));
        assert!(rx.try_recv().unwrap().is_ok());
    }
}

mod lists_tests {
    use super::*;

    #[test]
    fn test_reserve_is_monotonic() {
        let mut lists = ChildLists::default();
        assert_eq!(lists.reserve(), 1);
        assert_eq!(lists.reserve(), 2);
        assert_eq!(lists.committed_seq, 0);
    }

    #[test]
    fn test_live_ids_cover_every_list() {
        let mut lists = ChildLists::default();
        let a = text(1, "a");
        let b = text(2, "b");
        let c = text(3, "c");
        lists.current = vec![a.clone()];
        lists.committed = vec![a, b];
        lists.pending.push(PendingList {
            seq: 2,
            interim: true,
            epoch: 0,
            nodes: vec![c],
            notify: None,
        });
        let live = lists.live_ids();
        assert_eq!(live.len(), 3);
        assert!(live.contains(&InstanceId(3)));
        assert_eq!(lists.all_nodes().len(), 3);
    }

    #[test]
    fn test_forget_keeps_displayed_nodes_until_commit() {
        let mut lists = ChildLists::default();
        let shown = text(1, "shown");
        let fresh = text(2, "fresh");
        lists.current = vec![shown.clone(), fresh.clone()];
        lists.committed = vec![shown];
        lists.pending.push(PendingList {
            seq: 2,
            interim: false,
            epoch: 0,
            nodes: vec![fresh],
            notify: None,
        });

        assert!(lists.forget(InstanceId(1)));
        assert!(!lists.forget(InstanceId(2)));
        assert!(lists.current.is_empty());
        assert!(lists.pending[0].nodes.is_empty());
        let live = lists.live_ids();
        assert!(live.contains(&InstanceId(1)));
        assert!(!live.contains(&InstanceId(2)));
    }
}

mod node_tests {
    use super::*;

    #[test]
    fn test_accepts_matching_kinds() {
        let div = node(
            1,
            NodeKind::Host {
                tag: "div".into(),
                props: Props::new(),
                committed: Props::new(),
            },
        );
        let div = div.borrow();
        assert!(div.accepts(&Element::host("div").into()));
        assert!(!div.accepts(&Element::host("span").into()));
        assert!(!div.accepts(&Child::from("div")));
        assert!(text(2, "x").borrow().accepts(&Child::from("y")));
    }

    #[test]
    fn test_accepts_same_component_only() {
        let a = Component::function("A", |_ctx, _props| Ok(Child::Empty));
        let b = Component::function("A", |_ctx, _props| Ok(Child::Empty));
        let n = component_node(1, &a);
        let n = n.borrow();
        assert!(n.accepts(&a.element().into()));
        assert!(!n.accepts(&b.element().into()));
        assert_eq!(n.label(), "<A> Instance(1)");
    }

    #[test]
    fn test_can_catch_needs_handler_and_suspension() {
        let gen = Component::generator("G", |_ctx, _props| {
            |_ctx: &Context, _input: Resume| Step::Yield(Child::Empty)
        });
        let n = component_node(1, &gen);
        let mut n = n.borrow_mut();
        let inst = n.instance_mut().unwrap();
        inst.state = RenderState::AwaitingIteration;
        assert!(!inst.can_catch());
        inst.body = Body::Sync(Box::new(|_ctx: &Context, _input: Resume| Step::Yield(Child::Empty)));
        assert!(!inst.can_catch());
        inst.ctx.push_handler();
        assert!(inst.can_catch());
        inst.state = RenderState::Executing;
        assert!(!inst.can_catch());
    }
}

mod tree_tests {
    use super::*;

    fn attach(
        parent: &NodeRef,
        child: &NodeRef,
    ) {
        child.borrow_mut().parent = Rc::downgrade(parent);
        let mut p = parent.borrow_mut();
        p.lists.committed.push(child.clone());
        p.lists.current.push(child.clone());
    }

    #[test]
    fn test_host_children_skip_transparent_nodes() {
        let root = node(0, NodeKind::Root);
        let fragment = node(1, NodeKind::Fragment);
        let a = text(2, "a");
        let b = text(3, "b");
        a.borrow_mut().host = Some(HostId(10));
        b.borrow_mut().host = Some(HostId(11));
        attach(&root, &fragment);
        attach(&fragment, &a);
        attach(&root, &b);
        assert_eq!(host_children(&root), vec![HostId(10), HostId(11)]);
        assert!(Rc::ptr_eq(&host_anchor(&a).unwrap(), &root));
    }

    #[test]
    fn test_snapshot_rebuilds_committed_output() {
        let root = node(0, NodeKind::Root);
        let p = node(
            1,
            NodeKind::Host {
                tag: "p".into(),
                props: Props::new().with("id", "x"),
                committed: Props::new().with("id", "x"),
            },
        );
        attach(&root, &p);
        attach(&p, &text(2, "hi"));
        attach(&root, &node(3, NodeKind::Empty));
        assert_eq!(
            snapshot(&root),
            Child::from(Element::host("p").prop("id", "x").child("hi"))
        );
    }
}
