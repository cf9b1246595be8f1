//! End-to-end layout scenarios through the public API.

use std::{sync::Arc, time::Duration};

use float_cmp::{approx_eq, assert_approx_eq};

use astrolabe::{
    connector::{LayoutConnector, LayoutRegion, PathType},
    events::EventLog,
    geometry::{Bounds3, Vec3},
    graph::{ConstraintParams, Graph, LayoutEdge, LayoutNode},
    identifier::Id,
    layout::{
        Layout, LayoutContext, LayoutOptions,
        engines::{
            EngineBuilder, LayoutKind,
            adaptive::{GraphMetrics, RuleSet},
            force::ForceLayout,
        },
    },
    manager::LayoutManager,
};

fn position(graph: &Graph, id: &str) -> Vec3 {
    graph.node(Id::new(id)).unwrap().position
}

fn close(a: Vec3, b: Vec3) -> bool {
    approx_eq!(f32, a.x(), b.x(), epsilon = 1e-3)
        && approx_eq!(f32, a.y(), b.y(), epsilon = 1e-3)
        && approx_eq!(f32, a.z(), b.z(), epsilon = 1e-3)
}

fn nodes(names: &[&str]) -> Graph {
    let mut graph = Graph::new();
    for name in names {
        graph.add_node(LayoutNode::new(*name)).unwrap();
    }
    graph
}

#[test]
fn scenario_a_four_nodes_on_a_circle() {
    let mut graph = nodes(&["a", "b", "c", "d"]);
    let mut layout = EngineBuilder::new().build_named("circular").unwrap();
    layout
        .init(
            &mut graph,
            &LayoutOptions::new().with("radius", 200.0).with("start_angle", 0.0),
        )
        .unwrap();

    assert!(close(position(&graph, "a"), Vec3::new(200.0, 0.0, 0.0)));
    assert!(close(position(&graph, "b"), Vec3::new(0.0, 200.0, 0.0)));
    assert!(close(position(&graph, "c"), Vec3::new(-200.0, 0.0, 0.0)));
    assert!(close(position(&graph, "d"), Vec3::new(0.0, -200.0, 0.0)));
}

#[test]
fn scenario_b_chain_collapses_to_one_column() {
    let mut graph = nodes(&["A", "B", "C"]);
    graph.add_edge(LayoutEdge::new("A", "B")).unwrap();
    graph.add_edge(LayoutEdge::new("B", "C")).unwrap();

    let mut layout = EngineBuilder::new().build(LayoutKind::Hierarchical);
    layout
        .init(
            &mut graph,
            &LayoutOptions::new()
                .with("direction", "top_down")
                .with("level_separation", 150.0),
        )
        .unwrap();

    assert_approx_eq!(f32, position(&graph, "A").y(), 0.0);
    assert_approx_eq!(f32, position(&graph, "B").y(), -150.0);
    assert_approx_eq!(f32, position(&graph, "C").y(), -300.0);
    let x = position(&graph, "A").x();
    assert_approx_eq!(f32, position(&graph, "B").x(), x);
    assert_approx_eq!(f32, position(&graph, "C").x(), x);
}

#[test]
fn scenario_c_elastic_edge_settles_at_ideal_length() {
    let mut graph = Graph::new();
    graph
        .add_node(LayoutNode::new("left").with_position(Vec3::new(-50.0, 0.0, 0.0)))
        .unwrap();
    graph
        .add_node(LayoutNode::new("right").with_position(Vec3::new(50.0, 0.0, 0.0)))
        .unwrap();
    graph
        .add_edge(LayoutEdge::new("left", "right").with_params(ConstraintParams {
            ideal_length: Some(200.0),
            ..ConstraintParams::default()
        }))
        .unwrap();

    let events = Arc::new(EventLog::new());
    let mut layout = ForceLayout::new();
    layout.set_context(LayoutContext::new(events.clone()));
    layout
        .init(
            &mut graph,
            &LayoutOptions::new()
                .with("repulsion", 0.0)
                .with("gravity", 0.0)
                .with("frame_interval_ms", 0.0)
                .with("auto_stop_delay_ms", 100.0),
        )
        .unwrap();
    layout.run();

    assert!(layout.wait_until_stopped(&mut graph, Duration::from_secs(30)));
    layout.dispose();

    let distance = position(&graph, "left").distance(position(&graph, "right"));
    assert_approx_eq!(f32, distance, 200.0, epsilon = 2.0);
    assert_eq!(events.topics(), vec!["layout:stopped"]);
}

#[test]
fn scenario_d_direct_connection_between_regions() {
    let mut graph = Graph::new();
    graph
        .add_node(LayoutNode::new("src").with_position(Vec3::new(-200.0, 10.0, 0.0)))
        .unwrap();
    graph
        .add_node(LayoutNode::new("dst").with_position(Vec3::new(200.0, -10.0, 5.0)))
        .unwrap();

    let mut connector = LayoutConnector::default();
    connector.add_region(
        &graph,
        LayoutRegion::new(
            "left",
            Bounds3::from_center(Vec3::new(-200.0, 0.0, 0.0), Vec3::splat(150.0)),
            [Id::new("src")],
        ),
    );
    connector.add_region(
        &graph,
        LayoutRegion::new(
            "right",
            Bounds3::from_center(Vec3::new(200.0, 0.0, 0.0), Vec3::splat(150.0)),
            [Id::new("dst")],
        ),
    );

    let id = connector
        .add_connection(&graph, Id::new("src"), Id::new("dst"), PathType::Direct)
        .unwrap();
    let connection = connector.connection(id).unwrap();
    assert_eq!(
        connection.path,
        vec![position(&graph, "src"), position(&graph, "dst")]
    );
}

#[test]
fn pinned_nodes_hold_in_every_layout() {
    let anchor = Vec3::new(11.0, 22.0, 33.0);
    for kind in LayoutKind::ALL {
        let mut graph = nodes(&["n0", "n1", "n2", "n3"]);
        graph
            .add_node(LayoutNode::new("anchor").with_position(anchor).pinned(true))
            .unwrap();
        graph.add_edge(LayoutEdge::new("anchor", "n0")).unwrap();
        graph.add_edge(LayoutEdge::new("n0", "n1")).unwrap();
        graph.add_edge(LayoutEdge::new("n0", "n2")).unwrap();

        let mut layout = EngineBuilder::new().build(kind);
        layout.init(&mut graph, &LayoutOptions::new()).unwrap();
        assert_eq!(position(&graph, "anchor"), anchor, "{kind} init moved a pinned node");

        layout.kick(&mut graph, 1.0).unwrap();
        layout.tick(&mut graph, Duration::from_millis(500));
        assert_eq!(position(&graph, "anchor"), anchor, "{kind} kick moved a pinned node");
        layout.stop();
        layout.dispose();
    }
}

#[test]
fn primitive_layouts_are_deterministic() {
    for kind in [
        LayoutKind::Grid,
        LayoutKind::Circular,
        LayoutKind::Spherical,
        LayoutKind::Radial,
    ] {
        let names: Vec<String> = (0..13).map(|i| format!("d{i}")).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();

        let mut first = nodes(&names);
        let mut second = nodes(&names);
        EngineBuilder::new()
            .build(kind)
            .init(&mut first, &LayoutOptions::new())
            .unwrap();
        EngineBuilder::new()
            .build(kind)
            .init(&mut second, &LayoutOptions::new())
            .unwrap();

        assert_eq!(first.positions(), second.positions(), "{kind} is not deterministic");
    }
}

#[test]
fn rule_selection_depends_only_on_metrics() {
    let metrics = GraphMetrics {
        node_count: 40,
        edge_count: 300,
        density: 0.38,
        clustering: 0.2,
        ..GraphMetrics::default()
    };
    let rules = RuleSet::default();
    let first = rules.select(&metrics);
    let second = rules.select(&metrics);
    assert_eq!(first.target, second.target);
    assert_eq!(first.rule, second.rule);
    assert_eq!(first.target, "force");
}

#[test]
fn manager_lifecycle_publishes_events_in_order() {
    let events = Arc::new(EventLog::new());
    let builder = EngineBuilder::new().with_context(LayoutContext::new(events.clone()));
    let mut manager = LayoutManager::new(builder);
    let mut graph = nodes(&["m0", "m1", "m2"]);

    manager.apply_layout(&mut graph, "grid", &LayoutOptions::new()).unwrap();
    while manager.is_transitioning() {
        manager.tick(&mut graph, Duration::from_millis(100));
    }
    assert!(manager.apply_layout(&mut graph, "nowhere", &LayoutOptions::new()).is_err());
    manager.apply_layout(&mut graph, "radial", &LayoutOptions::new()).unwrap();
    while manager.is_transitioning() {
        manager.tick(&mut graph, Duration::from_millis(100));
    }
    assert!(manager.stop_layout(&mut graph));

    assert_eq!(manager.active_layout_name(), Some("radial"));
    assert_eq!(position(&graph, "m0"), Vec3::ZERO);
    assert_eq!(
        events.topics(),
        vec![
            "layout:started",
            "layout:stopped",
            "layout:started",
            "layout:stopped"
        ]
    );
}
