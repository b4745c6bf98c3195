use std::cell::RefCell;
use std::rc::Rc;

use quiz_core::model::QuizKind;
use services::Stage;

use crate::dom::NodeId;
use crate::lifecycle::{FixedConfirm, WidgetOptions};
use crate::markup::{
    ANSWER_INPUT, BACK_BUTTON, CONTINUE_BUTTON, ERROR_MESSAGE, ERROR_PANEL, FALSE_BUTTON,
    FEEDBACK_PANEL, FEEDBACK_TEXT, LOADING_PANEL, NEXT_BUTTON, QUESTION_PANEL, RESULTS_PANEL,
    RESULTS_SUMMARY, RETRY_BUTTON, SUBMIT_BUTTON, TIMER, TRUE_BUTTON,
};
use crate::page::NavTarget;
use crate::test_harness::{Harness, PendingConfirm, word_payload, writing_payload};

const AUTO_ADVANCE_MS: u64 = 2_000;

/// Answer every question of the current stage, `correct` of them right.
async fn play_word_stage(h: &Harness, root: NodeId, total: usize, correct: usize) {
    for i in 0..total {
        assert!(h.visible(root, QUESTION_PANEL), "question {i} not shown");
        let button = if i < correct { TRUE_BUTTON } else { FALSE_BUTTON };
        h.click(root, button).await;
        assert!(h.visible(root, FEEDBACK_PANEL));
        h.click(root, NEXT_BUTTON).await;
    }
}

#[tokio::test(start_paused = true)]
async fn completing_a_stage_scores_and_counts_progress() {
    let h = Harness::new();
    let kind = QuizKind::ReadAndSelect;
    h.serve(kind, word_payload(20));
    let root = h.add_root();
    let cleanup = h.mount(kind, root).await;

    assert!(h.visible(root, QUESTION_PANEL));
    play_word_stage(&h, root, 20, 15).await;

    assert!(h.visible(root, RESULTS_PANEL));
    assert_eq!(h.text(root, RESULTS_SUMMARY), "15 of 20 correct");
    let sessions = h.sessions(kind).await;
    assert_eq!(sessions.len(), 1);
    assert!((sessions[0].accuracy() - 75.0).abs() < 1e-9);
    let progress = h.progress(kind).await;
    assert_eq!((progress.completed(), progress.total()), (1, 6));

    // Exit after Results does not count the stage a second time.
    h.click(root, BACK_BUTTON).await;
    assert_eq!(h.progress(kind).await.completed(), 1);
    assert_eq!(h.page.navigations(), vec![NavTarget::Back]);
    assert_eq!(cleanup.stage(), Some(Stage::Exited));
    cleanup.call();
}

#[tokio::test(start_paused = true)]
async fn unmounting_after_results_keeps_stage_progress() {
    let h = Harness::new();
    let kind = QuizKind::ReadAndSelect;
    h.serve(kind, word_payload(20));
    let root = h.add_root();
    let cleanup = h.mount(kind, root).await;

    play_word_stage(&h, root, 20, 15).await;
    assert!(h.visible(root, RESULTS_PANEL));

    // The host navigates away on its own: cleanup only, no exit.
    cleanup.call();
    h.settle().await;

    assert_eq!(h.progress(kind).await.completed(), 1);
    assert_eq!(h.sessions(kind).await.len(), 1);
    assert!(h.page.navigations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn repeated_continue_reselects_once() {
    let h = Harness::new();
    let kind = QuizKind::ReadAndSelect;
    h.serve(kind, word_payload(30));
    let root = h.add_root();
    let cleanup = h.mount(kind, root).await;

    play_word_stage(&h, root, 20, 20).await;
    assert_eq!(h.used_pool(kind).await.len(), 20);

    let button = h.node(root, CONTINUE_BUTTON);
    h.enter(|| {
        h.page.click(button);
        h.page.click(button);
    });
    h.key(root, "Enter").await;

    // Only the ten unseen questions are served, and every used id was shown.
    play_word_stage(&h, root, 10, 10).await;
    assert!(h.visible(root, RESULTS_PANEL));
    assert_eq!(h.used_pool(kind).await.len(), 30);
    cleanup.call();
}

#[tokio::test(start_paused = true)]
async fn exhausted_stage_budget_continues_to_next_skill() {
    let h = Harness::new();
    let kind = QuizKind::ReadAndSelect;
    h.serve(kind, word_payload(20));
    let root = h.add_root();
    let cleanup = h.mount(kind, root).await;

    for stage in 1..=6 {
        play_word_stage(&h, root, 20, 20).await;
        assert!(h.visible(root, RESULTS_PANEL), "stage {stage}");
        assert!(h.visible(root, CONTINUE_BUTTON));
        h.click(root, CONTINUE_BUTTON).await;
        if stage < 6 {
            assert!(h.visible(root, QUESTION_PANEL), "stage {stage} did not reselect");
            assert!(h.page.navigations().is_empty());
        }
    }

    assert_eq!(
        h.page.navigations(),
        vec![NavTarget::Destination("/quiz/listen_and_select".into())]
    );
    assert_eq!(h.progress(kind).await.completed(), 6);
    assert_eq!(h.sessions(kind).await.len(), 6);
    // Only the first load fetched; later stages reselect from the cached set.
    assert_eq!(h.fetcher.fetch_count(), 1);
    cleanup.call();
}

#[tokio::test(start_paused = true)]
async fn empty_payload_shows_error_and_retry_recovers() {
    let h = Harness::new();
    let kind = QuizKind::ReadAndSelect;
    h.serve(kind, r#"{"questions": []}"#);
    let root = h.add_root();
    let cleanup = h.mount(kind, root).await;

    assert!(h.visible(root, ERROR_PANEL));
    assert!(!h.visible(root, QUESTION_PANEL));
    assert!(h.text(root, ERROR_MESSAGE).contains("empty or missing"));

    h.serve(kind, word_payload(3));
    h.click(root, RETRY_BUTTON).await;
    assert!(h.visible(root, QUESTION_PANEL));
    assert!(!h.visible(root, ERROR_PANEL));
    assert_eq!(h.fetcher.fetch_count(), 2);
    cleanup.call();
}

#[tokio::test(start_paused = true)]
async fn writing_timeout_with_text_submits_and_reaches_results() {
    let h = Harness::new();
    let kind = QuizKind::WriteAboutPhoto;
    h.serve(kind, writing_payload());
    let root = h.add_root();
    let cleanup = h.mount(kind, root).await;

    h.type_text(root, ANSWER_INPUT, "A dog runs in the park").await;
    assert!(h.visible(root, QUESTION_PANEL));

    h.advance(kind.profile().item_limit_ms).await;
    assert!(h.visible(root, FEEDBACK_PANEL));
    assert!(h.text(root, FEEDBACK_TEXT).contains("Time ran out"));

    h.advance(AUTO_ADVANCE_MS).await;
    assert!(h.visible(root, RESULTS_PANEL));
    let sessions = h.sessions(kind).await;
    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].details[0].timed_out);
    cleanup.call();
}

#[tokio::test(start_paused = true)]
async fn writing_timeout_without_text_waits_for_input() {
    let h = Harness::new();
    let kind = QuizKind::WriteAboutPhoto;
    h.serve(kind, writing_payload());
    let root = h.add_root();
    let cleanup = h.mount(kind, root).await;

    h.advance(kind.profile().item_limit_ms).await;
    assert!(h.visible(root, QUESTION_PANEL));
    assert_eq!(h.text(root, TIMER), "Time is up");

    h.advance(10 * kind.profile().item_limit_ms).await;
    assert!(h.visible(root, QUESTION_PANEL));
    assert_eq!(cleanup.active_timer_count(), 0);

    h.type_text(root, ANSWER_INPUT, "A dog").await;
    assert!(h.visible(root, FEEDBACK_PANEL));
    h.advance(AUTO_ADVANCE_MS).await;
    assert!(h.visible(root, RESULTS_PANEL));
    cleanup.call();
}

#[tokio::test(start_paused = true)]
async fn empty_manual_submit_is_ignored_for_writing() {
    let h = Harness::new();
    let kind = QuizKind::WriteAboutPhoto;
    h.serve(kind, writing_payload());
    let root = h.add_root();
    let cleanup = h.mount(kind, root).await;

    h.click(root, SUBMIT_BUTTON).await;
    assert!(h.visible(root, QUESTION_PANEL));
    h.type_text(root, ANSWER_INPUT, "A dog on grass").await;
    h.click(root, SUBMIT_BUTTON).await;
    assert!(h.visible(root, FEEDBACK_PANEL));
    assert_eq!(h.text(root, FEEDBACK_TEXT), "Response recorded.");
    cleanup.call();
}

#[tokio::test(start_paused = true)]
async fn skip_policy_submits_empty_answer_on_timeout() {
    let h = Harness::new();
    let kind = QuizKind::ReadAndSelect;
    h.serve(kind, word_payload(2));
    let root = h.add_root();
    let cleanup = h.mount(kind, root).await;

    h.advance(kind.profile().item_limit_ms).await;
    assert!(h.visible(root, FEEDBACK_PANEL));
    h.advance(AUTO_ADVANCE_MS).await;
    assert!(h.visible(root, QUESTION_PANEL));
    cleanup.call();
}

#[tokio::test(start_paused = true)]
async fn manual_next_cancels_auto_advance() {
    let h = Harness::new();
    let kind = QuizKind::ReadAndSelect;
    h.serve(kind, word_payload(3));
    let root = h.add_root();
    let cleanup = h.mount(kind, root).await;

    h.click(root, TRUE_BUTTON).await;
    h.advance(500).await;
    h.click(root, NEXT_BUTTON).await;
    assert!(h.visible(root, QUESTION_PANEL));
    // Question two's deadline and tick are the only timers left.
    assert_eq!(cleanup.active_timer_count(), 2);
    h.advance(AUTO_ADVANCE_MS).await;
    assert!(h.visible(root, QUESTION_PANEL));
    cleanup.call();
}

#[tokio::test(start_paused = true)]
async fn cleanup_releases_listeners_and_timers_in_every_stage() {
    let h = Harness::new();
    let kind = QuizKind::ReadAndSelect;
    h.serve(kind, word_payload(2));

    // Loading, question and feedback.
    for answered in [None, Some(false), Some(true)] {
        let root = h.add_root();
        let cleanup = match answered {
            None => {
                let module = h.module(kind, Rc::new(FixedConfirm(true)));
                h.init(&module, Some(root), WidgetOptions::default())
            }
            Some(click) => {
                let cleanup = h.mount(kind, root).await;
                if click {
                    h.click(root, TRUE_BUTTON).await;
                }
                cleanup
            }
        };
        assert!(cleanup.listener_count() > 0);

        cleanup.call();
        assert_eq!(cleanup.listener_count(), 0);
        assert_eq!(cleanup.active_timer_count(), 0);
        assert_eq!(h.page.document().listener_count(), 0);

        cleanup.call();
        assert!(cleanup.was_called());
        assert_eq!(h.page.document().listener_count(), 0);
        h.settle().await;
    }
}

#[tokio::test(start_paused = true)]
async fn load_finishing_after_cleanup_is_discarded() {
    let h = Harness::new();
    let kind = QuizKind::ReadAndSelect;
    h.serve(kind, word_payload(5));
    let root = h.add_root();

    let module = h.module(kind, Rc::new(FixedConfirm(true)));
    let cleanup = h.init(&module, Some(root), WidgetOptions::default());
    assert!(h.visible(root, LOADING_PANEL));
    cleanup.call();
    h.settle().await;

    assert_eq!(h.fetcher.fetch_count(), 1);
    assert!(h.visible(root, LOADING_PANEL));
    assert!(!h.visible(root, QUESTION_PANEL));
    assert_eq!(cleanup.active_timer_count(), 0);
    assert_eq!(cleanup.stage(), Some(Stage::Loading));
}

#[tokio::test(start_paused = true)]
async fn two_mounted_widgets_do_not_interfere() {
    let h = Harness::new();
    let kind = QuizKind::ReadAndSelect;
    h.serve(kind, word_payload(20));
    let first = h.add_root();
    let second = h.add_root();
    let cleanup_first = h.mount(kind, first).await;
    let cleanup_second = h.mount(kind, second).await;

    h.click(first, TRUE_BUTTON).await;
    assert!(h.visible(first, FEEDBACK_PANEL));
    assert!(h.visible(second, QUESTION_PANEL));

    cleanup_first.call();
    assert_eq!(cleanup_first.listener_count(), 0);
    assert!(cleanup_second.listener_count() > 0);

    h.click(second, FALSE_BUTTON).await;
    assert!(h.visible(second, FEEDBACK_PANEL));
    h.advance(AUTO_ADVANCE_MS).await;
    assert!(h.visible(second, QUESTION_PANEL));
    // The released widget stays frozen.
    assert!(h.visible(first, FEEDBACK_PANEL));
    cleanup_second.call();
}

#[tokio::test(start_paused = true)]
async fn missing_or_detached_root_yields_noop_cleanup() {
    let h = Harness::new();
    let module = h.module(QuizKind::ReadAndSelect, Rc::new(FixedConfirm(true)));

    let cleanup = h.init(&module, None, WidgetOptions::default());
    assert!(cleanup.is_noop());
    cleanup.call();
    cleanup.call();

    let detached = h.page.document_mut().create_element("section", None);
    let cleanup = h.init(&module, Some(detached), WidgetOptions::default());
    assert!(cleanup.is_noop());
    assert_eq!(h.fetcher.fetch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn keyboard_shortcuts_follow_the_visible_panel() {
    let h = Harness::new();
    let kind = QuizKind::ReadAndSelect;
    h.serve(kind, word_payload(3));
    let root = h.add_root();
    let cleanup = h.mount(kind, root).await;

    h.key(root, "t").await;
    assert!(h.visible(root, FEEDBACK_PANEL));
    h.key(root, "f").await;
    assert!(h.visible(root, FEEDBACK_PANEL));
    h.key(root, "Enter").await;
    assert!(h.visible(root, QUESTION_PANEL));

    // Keys outside the widget root never reach it.
    let outside = h.page.document().body();
    h.key(outside, "t").await;
    assert!(h.visible(root, QUESTION_PANEL));
    cleanup.call();
}

#[tokio::test(start_paused = true)]
async fn declined_exit_keeps_the_quiz_open() {
    let h = Harness::new();
    let kind = QuizKind::ReadAndSelect;
    h.serve(kind, word_payload(3));
    let root = h.add_root();
    let cleanup = h
        .mount_with(kind, root, Rc::new(FixedConfirm(false)), WidgetOptions::default())
        .await;

    h.click(root, BACK_BUTTON).await;
    assert!(h.page.navigations().is_empty());
    assert!(h.visible(root, QUESTION_PANEL));
    cleanup.call();
}

#[tokio::test(start_paused = true)]
async fn confirmation_answered_after_cleanup_does_not_navigate() {
    let h = Harness::new();
    let kind = QuizKind::ReadAndSelect;
    h.serve(kind, word_payload(3));
    let root = h.add_root();
    let (confirm, answer) = PendingConfirm::new();
    let cleanup = h.mount_with(kind, root, confirm, WidgetOptions::default()).await;

    h.click(root, BACK_BUTTON).await;
    cleanup.call();
    answer.send(true).unwrap();
    h.settle().await;
    assert!(h.page.navigations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn host_capabilities_replace_defaults() {
    let h = Harness::new();
    let kind = QuizKind::WritingSample;
    h.serve(kind, writing_payload());
    let root = h.add_root();
    let visited = Rc::new(RefCell::new(Vec::new()));
    let options = WidgetOptions {
        navigate: Some({
            let visited = Rc::clone(&visited);
            Rc::new(move |target: NavTarget| visited.borrow_mut().push(target))
        }),
        next_quiz_url: Some(Rc::new(|_: &quiz_core::model::SkillName| {
            Some("/dashboard".to_owned())
        })),
    };
    let cleanup = h.mount_with(kind, root, Rc::new(FixedConfirm(true)), options).await;

    for _ in 0..kind.profile().stage_budget {
        h.type_text(root, ANSWER_INPUT, "My essay about learning languages.").await;
        h.click(root, SUBMIT_BUTTON).await;
        h.click(root, NEXT_BUTTON).await;
        assert!(h.visible(root, RESULTS_PANEL));
        h.click(root, CONTINUE_BUTTON).await;
    }

    assert_eq!(
        *visited.borrow(),
        vec![NavTarget::Destination("/dashboard".into())]
    );
    assert!(h.page.navigations().is_empty());
    cleanup.call();
}

#[tokio::test(start_paused = true)]
async fn last_skill_hides_continue_once_budget_is_spent() {
    let h = Harness::new();
    let kind = QuizKind::WritingSample;
    h.serve(kind, writing_payload());
    let root = h.add_root();
    let cleanup = h.mount(kind, root).await;

    for stage in 1..=kind.profile().stage_budget {
        h.type_text(root, ANSWER_INPUT, "Another short essay.").await;
        h.click(root, SUBMIT_BUTTON).await;
        h.click(root, NEXT_BUTTON).await;
        let more = stage < kind.profile().stage_budget;
        assert_eq!(h.visible(root, CONTINUE_BUTTON), more, "stage {stage}");
        if more {
            h.click(root, CONTINUE_BUTTON).await;
        }
    }
    h.click(root, CONTINUE_BUTTON).await;
    assert!(h.visible(root, RESULTS_PANEL));
    assert!(h.page.navigations().is_empty());
    cleanup.call();
}
