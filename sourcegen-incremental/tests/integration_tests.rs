//! Integration tests for the incremental pipeline engine

use sourcegen_incremental::prelude::*;
use sourcegen_incremental::{EditFailure, EngineError, EntryState, StateTable, TableBuilder};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn tree(id: u64, root: SyntaxNode) -> SyntaxTree {
    SyntaxTree::new(TreeId(id), format!("file{id}.cs"), root)
}

fn class(name: &str, markers: &[&str]) -> SyntaxNode {
    let node = SyntaxNode::declaration(SyntaxKind::Class, name);
    if markers.is_empty() {
        node
    } else {
        node.with_markers(markers.iter().copied())
    }
}

fn unit(usings: Vec<UsingDirective>, members: Vec<SyntaxNode>) -> SyntaxNode {
    SyntaxNode::compilation_unit(usings, members)
}

fn none() -> CancellationToken {
    CancellationToken::none()
}

fn tracking() -> DriverOptions {
    DriverOptions::default().with_step_tracking()
}

/// One generated file per declaration carrying `marker`
fn marker_generator(marker: &str) -> Generator {
    let marker = marker.to_owned();
    Generator::new("markers", move |b| {
        let marked = b.alias_aware_selector(&marker, NodeShape::AnyDeclaration)?;
        let marked = b.with_tracking_name(marked, "marked");
        let sources = b.select(&marked, |m: &MatchedNode| {
            let name = m.name().unwrap_or("anonymous");
            GeneratedSource::new(format!("{name}.g.cs"), format!("// generated for {name}"))
        });
        let sources = b.with_tracking_name(sources, "sources");
        b.register_output(OutputKind::Source, &sources);
        Ok(())
    })
    .unwrap()
}

/// One generated file per auxiliary text
fn texts_generator() -> Generator {
    Generator::new("texts", |b| {
        let texts = b.additional_texts();
        let sources = b.select(&texts, |t: &AdditionalText| {
            GeneratedSource::new(format!("{}.g.cs", t.path()), t.text().to_uppercase())
        });
        b.register_output(OutputKind::Source, &sources);
        Ok(())
    })
    .unwrap()
}

fn hints(state: &DriverState) -> Vec<String> {
    state
        .last_result()
        .unwrap()
        .sources()
        .map(|s| s.hint_name.to_string())
        .collect()
}

fn alias_compilation(alias_target: &str) -> Compilation {
    Compilation::new(vec![
        tree(
            1,
            unit(
                vec![UsingDirective::alias("XAttribute", alias_target).global()],
                vec![],
            ),
        ),
        tree(2, unit(vec![], vec![class("C", &["X"])])),
        tree(3, unit(vec![], vec![class("D", &["Other"])])),
    ])
}

#[test]
fn test_diff_partitions_entries() {
    let mut builder = TableBuilder::new();
    for value in [1, 2, 3, 4] {
        builder.push(value, EntryState::Added);
    }
    let previous = builder.finish();

    let table = StateTable::diff(&previous, vec![1, 5, 3], |a, b| a == b);
    let states: Vec<_> = table.iter().map(|e| e.state).collect();
    assert_eq!(
        states,
        vec![
            EntryState::Cached,
            EntryState::Modified,
            EntryState::Cached,
            EntryState::Removed
        ]
    );
    let live: Vec<_> = table.values().copied().collect();
    assert_eq!(live, vec![1, 5, 3]);

    let grown = StateTable::diff(&table, vec![1, 5, 3, 8], |a, b| a == b);
    assert_eq!(grown.count(EntryState::Cached), 3);
    assert_eq!(grown.count(EntryState::Added), 1);
    assert_eq!(grown.count(EntryState::Removed), 0);
}

#[test]
fn test_full_run_idempotent() {
    let compilation = alias_compilation("NS.MarkerAttribute");
    let driver = DriverState::new(vec![marker_generator("Marker")], tracking());

    let first = driver.run_full(&compilation, &none()).unwrap();
    let second = first.run_full(&compilation, &none()).unwrap();

    let result = second.last_result().unwrap();
    assert!(result.same_outputs(first.last_result().unwrap()));
    assert_eq!(result.revision.0, 2);

    let generator = result.generator("markers").unwrap();
    assert!(!generator.steps.is_empty());
    for step in &generator.steps {
        assert!(step.is_cached(), "step {} was not cached", step.name);
    }
    assert_eq!(generator.step("marked.matches").unwrap().executions, 0);
}

#[test]
fn test_moved_tree_matches_fresh_run() {
    let generator = || {
        Generator::new("paths", |b| {
            let trees = b.syntax_trees();
            let sources = b.select(&trees, |t: &SyntaxTree| {
                GeneratedSource::new(format!("{}.g.cs", t.path()), t.path().to_owned())
            });
            b.register_output(OutputKind::Source, &sources);
            Ok(())
        })
        .unwrap()
    };
    let root = Arc::new(unit(vec![], vec![class("C", &[])]));
    let before = Compilation::new(vec![SyntaxTree::new(TreeId(1), "old.cs", Arc::clone(&root))]);
    let after = Compilation::new(vec![SyntaxTree::new(TreeId(1), "new.cs", root)]);

    let driver = DriverState::new(vec![generator()], DriverOptions::default());
    let incremental = driver
        .run_full(&before, &none())
        .unwrap()
        .run_full(&after, &none())
        .unwrap();
    let fresh = DriverState::new(vec![generator()], DriverOptions::default())
        .run_full(&after, &none())
        .unwrap();

    assert_eq!(hints(&incremental), vec!["new.cs.g.cs"]);
    assert!(incremental
        .last_result()
        .unwrap()
        .same_outputs(fresh.last_result().unwrap()));

    let moved_back = Compilation::new(vec![SyntaxTree::new(
        TreeId(1),
        "old.cs",
        after.trees()[0].root().clone(),
    )]);
    let state = incremental.apply_edits(Vec::new(), &moved_back, &none()).unwrap();
    assert_eq!(
        state.status(),
        DriverStatus::EditsFailed(EditFailure::SyntaxTreesChanged)
    );
}

#[test]
fn test_noop_edit_application() {
    let compilation = alias_compilation("NS.MarkerAttribute");
    let driver = DriverState::new(vec![marker_generator("Marker")], DriverOptions::default())
        .run_full(&compilation, &none())
        .unwrap();

    let applied = driver
        .apply_edits(Vec::<PendingEdit>::new(), &compilation, &none())
        .unwrap();

    assert_eq!(applied.status(), DriverStatus::Clean);
    assert!(Arc::ptr_eq(applied.tables(), driver.tables()));
    assert!(Arc::ptr_eq(
        applied.last_result().unwrap(),
        driver.last_result().unwrap()
    ));
    assert_eq!(applied.revision(), driver.revision());
}

#[test]
fn test_alias_resolution_and_per_file_rewalk() {
    let driver = DriverState::new(vec![marker_generator("Marker")], tracking());

    let driver = driver
        .run_full(&alias_compilation("NS.MarkerAttribute"), &none())
        .unwrap();
    assert_eq!(hints(&driver), vec!["C.g.cs"]);

    let driver = driver
        .run_full(&alias_compilation("NS.UnrelatedAttribute"), &none())
        .unwrap();
    assert!(hints(&driver).is_empty());

    let result = driver.last_result().unwrap();
    let generator = result.generator("markers").unwrap();

    let aliases = generator.step("marked.aliases").unwrap();
    assert_eq!(aliases.executions, 1);

    let global = generator.step("marked.global_aliases").unwrap();
    assert_eq!(global.states, vec![EntryState::Modified]);

    // the alias file changed and the file using the alias is affected;
    // the file with an unrelated marker is not walked again
    let matches = generator.step("marked.matches").unwrap();
    assert_eq!(matches.executions, 2);
    assert_eq!(
        matches.states,
        vec![EntryState::Cached, EntryState::Modified, EntryState::Cached]
    );

    let marked = generator.step("marked").unwrap();
    assert_eq!(marked.states, vec![EntryState::Removed]);
}

#[test]
fn test_alias_restored() {
    let driver = DriverState::new(vec![marker_generator("Marker")], DriverOptions::default());
    let driver = driver
        .run_full(&alias_compilation("NS.UnrelatedAttribute"), &none())
        .unwrap();
    assert!(hints(&driver).is_empty());

    let driver = driver
        .run_full(&alias_compilation("NS.MarkerAttribute"), &none())
        .unwrap();
    assert_eq!(hints(&driver), vec!["C.g.cs"]);
}

#[test]
fn test_unrelated_alias_change_skips_walks() {
    let compilation = Compilation::new(vec![
        tree(
            1,
            unit(
                vec![UsingDirective::alias("YAttribute", "NS.AAttribute").global()],
                vec![],
            ),
        ),
        tree(2, unit(vec![], vec![class("C", &["Marker"])])),
    ]);
    let driver = DriverState::new(vec![marker_generator("Marker")], tracking())
        .run_full(&compilation, &none())
        .unwrap();

    let edited = compilation.with_tree(tree(
        1,
        unit(
            vec![UsingDirective::alias("YAttribute", "NS.BAttribute").global()],
            vec![],
        ),
    ));
    let driver = driver.run_full(&edited, &none()).unwrap();

    let result = driver.last_result().unwrap();
    let generator = result.generator("markers").unwrap();
    // only the edited file itself is walked
    assert_eq!(generator.step("marked.matches").unwrap().executions, 1);
    assert_eq!(hints(&driver), vec!["C.g.cs"]);
}

#[test]
fn test_alias_cycle_has_no_match() {
    let compilation = Compilation::new(vec![
        tree(
            1,
            unit(
                vec![
                    UsingDirective::alias("A", "NS.B").global(),
                    UsingDirective::alias("B", "NS.A").global(),
                ],
                vec![],
            ),
        ),
        tree(2, unit(vec![], vec![class("First", &["A"]), class("Second", &["B"])])),
    ]);

    let driver = DriverState::new(vec![marker_generator("Marker")], DriverOptions::default())
        .run_full(&compilation, &none())
        .unwrap();
    assert!(hints(&driver).is_empty());
}

#[test]
fn test_first_match_dedup() {
    let compilation = Compilation::new(vec![tree(
        1,
        unit(
            vec![],
            vec![class("Twice", &["Marker", "MarkerAttribute"]), class("Once", &["Marker"])],
        ),
    )]);

    let driver = DriverState::new(vec![marker_generator("Marker")], DriverOptions::default())
        .run_full(&compilation, &none())
        .unwrap();
    assert_eq!(hints(&driver), vec!["Twice.g.cs", "Once.g.cs"]);
}

#[test]
fn test_local_alias_in_namespace() {
    let compilation = Compilation::new(vec![tree(
        1,
        unit(
            vec![],
            vec![
                SyntaxNode::namespace(
                    "App",
                    vec![UsingDirective::alias("Gen", "Tools.MarkerAttribute")],
                    vec![class("Inside", &["Gen"])],
                ),
                class("Outside", &["Gen"]),
            ],
        ),
    )]);

    let driver = DriverState::new(vec![marker_generator("Marker")], DriverOptions::default())
        .run_full(&compilation, &none())
        .unwrap();
    assert_eq!(hints(&driver), vec!["Inside.g.cs"]);
}

#[test]
fn test_fallback_after_unknown_removal() {
    let compilation = Compilation::default();
    let seed = || {
        DriverState::new(vec![texts_generator()], DriverOptions::default())
            .add_additional_texts([AdditionalText::new("a.txt", "alpha")])
    };

    let driver = seed().run_full(&compilation, &none()).unwrap();
    let failed = driver
        .apply_edits(
            [PendingEdit::AdditionalFileRemoved(AdditionalText::new("ghost.txt", ""))],
            &compilation,
            &none(),
        )
        .unwrap();

    assert_eq!(
        failed.status(),
        DriverStatus::EditsFailed(EditFailure::RemovedUnknownText {
            path: "ghost.txt".into()
        })
    );
    assert!(Arc::ptr_eq(
        failed.last_result().unwrap(),
        driver.last_result().unwrap()
    ));

    // sticky until a full run
    let still_failed = failed
        .queue_edit(PendingEdit::AdditionalFileAdded(AdditionalText::new("b.txt", "beta")))
        .apply_pending_edits(&compilation, &none())
        .unwrap();
    assert!(matches!(still_failed.status(), DriverStatus::EditsFailed(_)));

    let recovered = failed.run_full(&compilation, &none()).unwrap();
    assert_eq!(recovered.status(), DriverStatus::Clean);
    assert!(recovered.pending_edits().is_empty());

    let fresh = seed().run_full(&compilation, &none()).unwrap();
    assert!(recovered
        .last_result()
        .unwrap()
        .same_outputs(fresh.last_result().unwrap()));
}

#[test]
fn test_edit_application_updates_outputs() {
    let compilation = Compilation::default();
    let a = AdditionalText::new("a.txt", "alpha");
    let driver = DriverState::new(vec![texts_generator()], DriverOptions::default())
        .add_additional_texts([a.clone()])
        .run_full(&compilation, &none())
        .unwrap();

    let driver = driver.queue_edit(PendingEdit::AdditionalFileChanged {
        old: a,
        new: AdditionalText::new("a.txt", "omega"),
    });
    assert_eq!(driver.status(), DriverStatus::EditsPending);

    let driver = driver
        .queue_edit(PendingEdit::AdditionalFileAdded(AdditionalText::new("b.txt", "beta")))
        .apply_pending_edits(&compilation, &none())
        .unwrap();

    assert_eq!(driver.status(), DriverStatus::Clean);
    let result = driver.last_result().unwrap();
    let generator = result.generator("texts").unwrap();
    assert_eq!(&*generator.source("a.txt.g.cs").unwrap().text, "OMEGA");
    assert_eq!(&*generator.source("b.txt.g.cs").unwrap().text, "BETA");

    // incremental and full runs agree
    let full = DriverState::new(vec![texts_generator()], DriverOptions::default())
        .add_additional_texts(driver.additional_texts().to_vec())
        .run_full(&compilation, &none())
        .unwrap();
    assert!(result.same_outputs(full.last_result().unwrap()));
}

#[test]
fn test_edits_require_prior_run_and_same_trees() {
    let compilation = alias_compilation("NS.MarkerAttribute");
    let driver = DriverState::new(vec![texts_generator()], DriverOptions::default());

    let never_run = driver
        .apply_edits(
            [PendingEdit::AdditionalFileAdded(AdditionalText::new("a.txt", "a"))],
            &compilation,
            &none(),
        )
        .unwrap();
    assert_eq!(
        never_run.status(),
        DriverStatus::EditsFailed(EditFailure::NoPriorRun)
    );

    let ran = driver.run_full(&compilation, &none()).unwrap();
    let other = compilation.with_tree(tree(9, unit(vec![], vec![])));
    let changed = ran
        .apply_edits(
            [PendingEdit::AdditionalFileAdded(AdditionalText::new("a.txt", "a"))],
            &other,
            &none(),
        )
        .unwrap();
    assert_eq!(
        changed.status(),
        DriverStatus::EditsFailed(EditFailure::SyntaxTreesChanged)
    );
}

#[test]
fn test_incremental_edits_disabled() {
    let compilation = Compilation::default();
    let driver = DriverState::new(
        vec![texts_generator()],
        DriverOptions::default().without_incremental_edits(),
    )
    .run_full(&compilation, &none())
    .unwrap();

    let applied = driver
        .apply_edits(
            [PendingEdit::AdditionalFileAdded(AdditionalText::new("a.txt", "a"))],
            &compilation,
            &none(),
        )
        .unwrap();
    assert_eq!(
        applied.status(),
        DriverStatus::EditsFailed(EditFailure::IncrementalEditsDisabled)
    );

    let full = applied.run_full(&compilation, &none()).unwrap();
    assert_eq!(hints(&full), vec!["a.txt.g.cs"]);
}

#[test]
fn test_cancelled_run_publishes_nothing() {
    let compilation = alias_compilation("NS.MarkerAttribute");
    let driver = DriverState::new(vec![marker_generator("Marker")], DriverOptions::default())
        .run_full(&compilation, &none())
        .unwrap();

    let token = CancellationToken::new();
    token.cancel();
    let edited = compilation.with_tree(tree(4, unit(vec![], vec![class("E", &["Marker"])])));
    let result = driver.run_full(&edited, &token);
    assert!(matches!(result, Err(EngineError::Cancelled)));

    // the previous state is still usable
    assert_eq!(driver.revision().0, 1);
    let next = driver.run_full(&edited, &none()).unwrap();
    assert_eq!(hints(&next), vec!["C.g.cs", "E.g.cs"]);
}

#[test]
fn test_combine_and_collect_caching() {
    let walks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&walks);

    let generator = Generator::new("settings", move |b| {
        let classes = b.source_filter_transform(
            |n| n.kind() == SyntaxKind::Class,
            move |ctx| {
                counter.fetch_add(1, Ordering::SeqCst);
                ctx.node.name().unwrap_or_default().to_owned()
            },
        );
        let texts = b.additional_texts();
        let lines = b.select_many(&texts, |t: &AdditionalText| {
            t.text().lines().map(str::to_owned).collect::<Vec<_>>()
        });
        let settings = b.collect(&lines);
        let pairs = b.combine(&classes, &settings);
        let pairs = b.with_tracking_name(pairs, "pairs");
        let sources = b.select(&pairs, |(name, settings): &(String, Arc<[String]>)| {
            GeneratedSource::new(format!("{name}.g.cs"), settings.join(","))
        });
        b.register_output(OutputKind::Source, &sources);
        Ok(())
    })
    .unwrap();

    let compilation = Compilation::new(vec![
        tree(1, unit(vec![], vec![class("A", &[])])),
        tree(2, unit(vec![], vec![class("B", &[])])),
    ]);
    let settings = AdditionalText::new("settings.txt", "x=1");
    let driver = DriverState::new(vec![generator], tracking())
        .add_additional_texts([settings.clone()])
        .run_full(&compilation, &none())
        .unwrap();
    assert_eq!(walks.load(Ordering::SeqCst), 2);

    // text edit: classes are not re-derived, every pair is
    let driver = driver
        .apply_edits(
            [PendingEdit::AdditionalFileChanged {
                old: settings,
                new: AdditionalText::new("settings.txt", "x=2\ny=3"),
            }],
            &compilation,
            &none(),
        )
        .unwrap();
    assert_eq!(driver.status(), DriverStatus::Clean);
    assert_eq!(walks.load(Ordering::SeqCst), 2);
    let result = driver.last_result().unwrap();
    let generator = result.generator("settings").unwrap();
    assert_eq!(&*generator.source("A.g.cs").unwrap().text, "x=2,y=3");
    let pairs = generator.step("pairs").unwrap();
    assert_eq!(pairs.executions, 2);
    assert_eq!(pairs.count(EntryState::Modified), 2);

    // tree edit: only the edited file is walked, only its pair recomputed
    let edited = compilation.with_tree(tree(2, unit(vec![], vec![class("B", &[]), class("C", &[])])));
    let driver = driver.run_full(&edited, &none()).unwrap();
    assert_eq!(walks.load(Ordering::SeqCst), 4);

    let result = driver.last_result().unwrap();
    let generator = result.generator("settings").unwrap();
    let pairs = generator.step("pairs").unwrap();
    assert_eq!(
        pairs.states,
        vec![EntryState::Cached, EntryState::Cached, EntryState::Added]
    );
    assert_eq!(pairs.executions, 1);
    assert_eq!(hints(&driver), vec!["A.g.cs", "B.g.cs", "C.g.cs"]);
}

#[test]
fn test_duplicate_hint_name() {
    let generator = Generator::new("dupes", |b| {
        let classes = b.source_filter_transform(
            |n| n.kind() == SyntaxKind::Class,
            |_| GeneratedSource::new("same.g.cs", ""),
        );
        b.register_output(OutputKind::Source, &classes);
        Ok(())
    })
    .unwrap();
    let compilation = Compilation::new(vec![tree(
        1,
        unit(vec![], vec![class("A", &[]), class("B", &[])]),
    )]);

    let result = DriverState::new(vec![generator], DriverOptions::default())
        .run_full(&compilation, &none());
    match result {
        Err(EngineError::DuplicateHintName { generator, hint }) => {
            assert_eq!(generator, "dupes");
            assert_eq!(hint, "same.g.cs");
        }
        other => panic!("expected duplicate hint error, got {other:?}"),
    }
}

#[test]
fn test_disabled_output_kind() {
    let generator = Generator::new("kinds", |b| {
        let classes = b.source_filter_transform(
            |n| n.kind() == SyntaxKind::Class,
            |ctx| ctx.node.name().unwrap_or_default().to_owned(),
        );
        let declarations = b.select(&classes, |name: &String| {
            GeneratedSource::new(format!("{name}.decl.g.cs"), "")
        });
        let bodies = b.select(&classes, |name: &String| {
            GeneratedSource::new(format!("{name}.impl.g.cs"), "")
        });
        b.register_output(OutputKind::Source, &declarations);
        b.register_output(OutputKind::Implementation, &bodies);
        Ok(())
    })
    .unwrap();
    let compilation = Compilation::new(vec![tree(1, unit(vec![], vec![class("A", &[])]))]);

    let options = DriverOptions::default().disable_output(OutputKind::Implementation);
    let driver = DriverState::new(vec![generator], options)
        .run_full(&compilation, &none())
        .unwrap();
    assert_eq!(hints(&driver), vec!["A.decl.g.cs"]);
}

#[test]
fn test_direct_text_operations() {
    let compilation = Compilation::default();
    let driver = DriverState::new(vec![texts_generator()], DriverOptions::default())
        .add_additional_texts([
            AdditionalText::new("a.txt", "a"),
            AdditionalText::new("b.txt", "b"),
        ])
        .run_full(&compilation, &none())
        .unwrap();

    let changed = driver
        .remove_additional_texts(["a.txt"])
        .replace_additional_text(
            &AdditionalText::new("b.txt", "b"),
            AdditionalText::new("b.txt", "bee"),
        );
    assert_eq!(changed.additional_texts().len(), 1);

    // no queued edits, but the texts differ from the last run
    let applied = changed.apply_pending_edits(&compilation, &none()).unwrap();
    assert_eq!(hints(&applied), vec!["b.txt.g.cs"]);
    assert_eq!(
        &*applied.last_result().unwrap().sources().next().unwrap().text,
        "BEE"
    );
}

#[test]
fn test_step_metrics_display() {
    let compilation = alias_compilation("NS.MarkerAttribute");
    let driver = DriverState::new(vec![marker_generator("Marker")], tracking())
        .run_full(&compilation, &none())
        .unwrap();

    let result = driver.last_result().unwrap();
    let metrics = result.generator("markers").unwrap().metrics();
    let sources = metrics
        .iter()
        .find(|m| &*m.step_name == "sources")
        .unwrap();
    assert_eq!(sources.recomputed, 1);
    assert!(sources.to_string().contains("Step: sources"));
}

#[test]
fn test_step_tracking_off_by_default() {
    let compilation = alias_compilation("NS.MarkerAttribute");
    let driver = DriverState::new(vec![marker_generator("Marker")], DriverOptions::default())
        .run_full(&compilation, &none())
        .unwrap();
    let result = driver.last_result().unwrap();
    assert!(result.generator("markers").unwrap().steps.is_empty());
}
