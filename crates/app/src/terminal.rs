//! Line-oriented host for one quiz widget at a time.
//!
//! The widget runs on a headless page; this module prints whichever panel is
//! visible and turns typed lines into clicks, key presses and input events.

use std::cell::RefCell;
use std::io::BufRead;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use quiz_core::model::QuizKind;
use services::AppServices;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use ui::markup::{
    ANSWER_INPUT, BACK_BUTTON, CONTINUE_BUTTON, ERROR_MESSAGE, ERROR_PANEL, FEEDBACK_PANEL,
    FEEDBACK_TEXT, LEVEL, LOADING_PANEL, OPTION_SLOTS, PROGRESS, PROMPT, QUESTION_PANEL,
    RESULTS_PANEL, RESULTS_SUMMARY, RETRY_BUTTON, SCORE, TIMER, TITLE, TRUE_BUTTON,
    option_button_id,
};
use ui::{
    Cleanup, ConfirmExit, DomError, NavTarget, NodeId, Page, QuizModule, WidgetOptions,
    mount_quiz_markup, resolve,
};

const FRAME: Duration = Duration::from_millis(100);

/// Asks on stdout; the next typed line answers.
#[derive(Default)]
struct TerminalConfirm {
    pending: RefCell<Option<oneshot::Sender<bool>>>,
}

impl TerminalConfirm {
    /// Route `line` to a waiting confirmation. Returns `false` if none waits.
    fn answer(&self, line: &str) -> bool {
        let Some(sender) = self.pending.borrow_mut().take() else {
            return false;
        };
        let yes = matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes");
        // The widget may have gone away meanwhile.
        let _ = sender.send(yes);
        true
    }
}

#[async_trait(?Send)]
impl ConfirmExit for TerminalConfirm {
    async fn confirm_exit(&self) -> bool {
        let (sender, receiver) = oneshot::channel();
        self.pending.replace(Some(sender));
        println!("Leave this quiz? Completed stages are saved. [y/N]");
        receiver.await.unwrap_or(false)
    }
}

struct Mounted {
    kind: QuizKind,
    root: NodeId,
    cleanup: Cleanup,
}

impl Mounted {
    fn unmount(self, page: &Page) {
        self.cleanup.call();
        if let Err(err) = page.document_mut().remove(self.root) {
            debug!(error = %err, "widget root already gone");
        }
    }
}

fn mount(
    page: &Rc<Page>,
    services: &AppServices,
    confirm: &Rc<TerminalConfirm>,
    kind: QuizKind,
) -> Result<Mounted, DomError> {
    let root = {
        let mut doc = page.document_mut();
        let body = doc.body();
        let root = doc.append_new(body, "section", None)?;
        mount_quiz_markup(&mut doc, root)?;
        root
    };
    let confirm: Rc<dyn ConfirmExit> = Rc::clone(confirm) as Rc<dyn ConfirmExit>;
    let module = QuizModule::new(kind, services.clone(), confirm);
    let cleanup = module.init(page, Some(root), WidgetOptions::default());
    info!(kind = %kind, "quiz started");
    Ok(Mounted {
        kind,
        root,
        cleanup,
    })
}

/// Blocking stdin reads happen on their own thread so widget timers keep
/// running.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (sender, receiver) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if sender.send(line).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "stdin read failed");
                    break;
                }
            }
        }
    });
    receiver
}

/// Drive quizzes starting at `kind` until the user leaves, input closes or
/// the skill order runs out. Must run inside a `tokio::task::LocalSet`.
///
/// # Errors
///
/// Returns `DomError` if the widget markup cannot be built.
pub async fn run(kind: QuizKind, services: AppServices) -> Result<(), DomError> {
    let page = Page::new();
    let confirm = Rc::new(TerminalConfirm::default());
    let mut lines = spawn_stdin_reader();
    let mut current = mount(&page, &services, &confirm, kind)?;
    // Redraw cadence only; widget timers run as their own tasks.
    let mut frame = tokio::time::interval(FRAME);
    let mut shown: Vec<String> = Vec::new();

    print_help();
    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else {
                    info!("input closed");
                    current.unmount(&page);
                    return Ok(());
                };
                if !confirm.answer(&line) {
                    handle_line(&page, current.root, &line);
                }
            }
            _ = frame.tick() => {}
        }

        let screen = screen(&page, current.root);
        if screen != shown {
            print_screen(&page, current.root, &screen);
            shown = screen;
        }

        for target in page.take_navigations() {
            match target {
                NavTarget::Back => {
                    println!("Progress saved. Goodbye.");
                    current.unmount(&page);
                    return Ok(());
                }
                NavTarget::Destination(url) => {
                    let Some(next) = kind_for_url(&url) else {
                        println!("Continue at {url}");
                        current.unmount(&page);
                        return Ok(());
                    };
                    info!(from = %current.kind, to = %next, "moving to next skill");
                    current.unmount(&page);
                    current = mount(&page, &services, &confirm, next)?;
                    shown.clear();
                }
            }
        }
    }
}

fn kind_for_url(url: &str) -> Option<QuizKind> {
    url.strip_prefix("/quiz/")?.parse().ok()
}

fn print_help() {
    println!("Keys: t / f answer real-word questions, 1-4 pick an option.");
    println!("Type an answer and press Enter for typed questions.");
    println!("Enter alone moves on. Commands: /back /retry /continue /time");
}

fn handle_line(page: &Page, root: NodeId, line: &str) {
    let find = |id: &str| resolve(&page.document(), root, id);
    let click = |id: &str| match find(id) {
        Some(node) => page.click(node),
        None => debug!(id, "control not present"),
    };
    match line.trim() {
        "" => page.key_down(root, "Enter"),
        "/back" => click(BACK_BUTTON),
        "/retry" => click(RETRY_BUTTON),
        "/continue" => click(CONTINUE_BUTTON),
        "/time" => {
            if let Some(node) = find(TIMER) {
                println!("{}", page.document().text(node).unwrap_or_default());
            }
        }
        key @ ("t" | "f" | "T" | "F" | "1" | "2" | "3" | "4") => page.key_down(root, key),
        text => {
            if let Some(input) = find(ANSWER_INPUT) {
                page.input(input, text);
            }
            page.key_down(root, "Enter");
        }
    }
}

/// Lines describing the visible panel. The countdown is left out so the
/// screen only reprints on real changes.
fn screen(page: &Page, root: NodeId) -> Vec<String> {
    let doc = page.document();
    let text = |id: &str| {
        resolve(&doc, root, id)
            .and_then(|node| doc.text(node))
            .unwrap_or_default()
            .to_owned()
    };
    let visible = |id: &str| resolve(&doc, root, id).is_some_and(|node| doc.is_visible(node));

    let mut lines = vec![format!("== {} ==", text(TITLE))];
    if visible(LOADING_PANEL) {
        lines.push("Loading questions...".to_owned());
    } else if visible(ERROR_PANEL) {
        lines.push(text(ERROR_MESSAGE));
        lines.push("Type /retry to try again or /back to leave.".to_owned());
    } else if visible(QUESTION_PANEL) {
        lines.push(text(PROGRESS));
        lines.push(text(PROMPT));
        if visible(TRUE_BUTTON) {
            lines.push("[t] real word   [f] not a word".to_owned());
        }
        for index in 0..OPTION_SLOTS {
            let id = option_button_id(index);
            if visible(&id) {
                lines.push(format!("[{}] {}", index + 1, text(&id)));
            }
        }
        if visible(ANSWER_INPUT) {
            lines.push("Type your answer and press Enter.".to_owned());
        }
    } else if visible(FEEDBACK_PANEL) {
        lines.push(text(FEEDBACK_TEXT));
        lines.push("Press Enter for the next question.".to_owned());
    } else if visible(RESULTS_PANEL) {
        lines.push(text(RESULTS_SUMMARY));
        lines.push(format!("Score: {} ({})", text(SCORE), text(LEVEL)));
        if visible(CONTINUE_BUTTON) {
            lines.push("Press Enter to continue or /back to leave.".to_owned());
        } else {
            lines.push("All stages done. Type /back to leave.".to_owned());
        }
    }
    lines
}

fn print_screen(page: &Page, root: NodeId, lines: &[String]) {
    println!();
    for line in lines {
        println!("{line}");
    }
    let doc = page.document();
    let timer = resolve(&doc, root, QUESTION_PANEL)
        .filter(|panel| doc.is_visible(*panel))
        .and_then(|_| resolve(&doc, root, TIMER))
        .and_then(|node| doc.text(node));
    if let Some(timer) = timer {
        println!("Time left: {timer}");
    }
}
