use anyhow::Result;
use chrono::{Local, NaiveDate};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;

use applytrack::jobs;
use applytrack::models::{Job, JobStatus, Note, Reminder};
use applytrack::notes;
use applytrack::notify::{Notification, NotificationLog};
use applytrack::reminders;
use applytrack::timeline::{self, EventKind};

use crate::{short, truncate, Hooks};

struct AppState {
    search: String,
    statuses: Vec<JobStatus>,
    jobs: Vec<Job>,
    reminders: Vec<Reminder>,
    notes: Vec<Note>,
    selected: usize,
    scroll_offset: u16,
    today: NaiveDate,
    toast: Option<Notification>,
}

impl AppState {
    fn new(search: &str, statuses: &[JobStatus]) -> Self {
        Self {
            search: search.to_string(),
            statuses: statuses.to_vec(),
            jobs: Vec::new(),
            reminders: Vec::new(),
            notes: Vec::new(),
            selected: 0,
            scroll_offset: 0,
            today: Local::now().date_naive(),
            toast: None,
        }
    }

    /// Copy the hooks' lists into the view, keeping the selection in range.
    fn sync(&mut self, hooks: &Hooks) {
        self.jobs = jobs::filter(&hooks.jobs.jobs(), &self.search, &self.statuses);
        self.reminders = hooks.reminders.reminders();
        self.notes = hooks.notes.notes();
        if self.selected >= self.jobs.len() {
            self.selected = self.jobs.len().saturating_sub(1);
        }
    }

    fn current_job(&self) -> Option<&Job> {
        self.jobs.get(self.selected)
    }

    fn next(&mut self) {
        if !self.jobs.is_empty() && self.selected < self.jobs.len() - 1 {
            self.selected += 1;
            self.scroll_offset = 0;
        }
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.scroll_offset = 0;
        }
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }
}

async fn load(hooks: &Hooks) -> Result<()> {
    hooks.jobs.fetch().await?;
    hooks.reminders.fetch().await?;
    hooks.notes.fetch().await?;
    Ok(())
}

pub async fn run_browse(
    hooks: &Hooks,
    log: &NotificationLog,
    search: &str,
    statuses: &[JobStatus],
) -> Result<()> {
    load(hooks).await?;

    let mut state = AppState::new(search, statuses);
    state.sync(hooks);
    if state.jobs.is_empty() {
        println!("No jobs found.");
        return Ok(());
    }

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, hooks, log).await;

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    hooks: &Hooks,
    log: &NotificationLog,
) -> Result<()> {
    let mut list_state = ListState::default();
    list_state.select(Some(0));

    loop {
        terminal.draw(|frame| draw(frame, state, &mut list_state))?;

        let Event::Key(key) = tokio::task::block_in_place(event::read)? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        let new_status = match key.code {
            KeyCode::Char('q') | KeyCode::Esc => break,
            KeyCode::Down | KeyCode::Char('j') => {
                state.next();
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                state.prev();
                None
            }
            KeyCode::Char('J') | KeyCode::PageDown => {
                state.scroll_down();
                None
            }
            KeyCode::Char('K') | KeyCode::PageUp => {
                state.scroll_up();
                None
            }
            KeyCode::Char('r') => {
                // Failures are already on the toast line
                let _ = load(hooks).await;
                state.sync(hooks);
                None
            }
            KeyCode::Char('a') => Some(JobStatus::Applied),
            KeyCode::Char('i') => Some(JobStatus::Interview),
            KeyCode::Char('o') => Some(JobStatus::Offer),
            KeyCode::Char('x') => Some(JobStatus::Rejected),
            KeyCode::Char('w') => Some(JobStatus::Waiting),
            _ => None,
        };

        if let Some(status) = new_status {
            if let Some(id) = state.current_job().map(|job| job.id) {
                if hooks.jobs.set_status(id, status).await.is_ok() {
                    state.sync(hooks);
                }
            }
        }

        state.toast = log.latest();
        if state.jobs.is_empty() {
            list_state.select(None);
        } else {
            list_state.select(Some(state.selected));
        }
    }
    Ok(())
}

fn status_icon(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Applied => "+",
        JobStatus::Interview => "*",
        JobStatus::Offer => "$",
        JobStatus::Rejected => "x",
        JobStatus::Waiting => "~",
    }
}

fn status_style(status: JobStatus) -> Style {
    match status {
        JobStatus::Applied => Style::default().fg(Color::Cyan),
        JobStatus::Interview => Style::default().fg(Color::Yellow),
        JobStatus::Offer => Style::default().fg(Color::Green),
        JobStatus::Rejected => Style::default().fg(Color::Red),
        JobStatus::Waiting => Style::default().fg(Color::DarkGray),
    }
}

fn draw(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(frame.area());

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(35),
            Constraint::Percentage(65),
        ])
        .split(rows[0]);

    // Left panel: job list
    let items: Vec<ListItem> = state
        .jobs
        .iter()
        .map(|job| {
            ListItem::new(format!(
                "{} {} {} | {}",
                status_icon(job.status),
                short(job.id),
                truncate(&job.position, 30),
                job.company
            ))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(format!(
            " Jobs ({}) ", state.jobs.len()
        )))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, chunks[0], list_state);

    // Right panel: job detail
    let detail = build_detail(state);
    let detail_widget = Paragraph::new(detail)
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));

    frame.render_widget(detail_widget, chunks[1]);

    // Latest notification
    if let Some(toast) = &state.toast {
        let text = match &toast.description {
            Some(description) => format!(" {} {}", toast.title, description),
            None => format!(" {}", toast.title),
        };
        let style = if toast.is_destructive() {
            Style::default().fg(Color::Red)
        } else {
            Style::default().fg(Color::Green)
        };
        frame.render_widget(Paragraph::new(text).style(style), rows[1]);
    }

    let help = Paragraph::new(
        " j/k:navigate  J/K:scroll  a:applied i:interview o:offer x:rejected w:waiting  r:reload  q:quit"
    )
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, rows[2]);
}

fn section(title: &str) -> Line<'static> {
    Line::from(Span::styled(
        title.to_string(),
        Style::default().add_modifier(Modifier::BOLD),
    ))
}

fn build_detail<'a>(state: &'a AppState) -> Text<'a> {
    let Some(job) = state.current_job() else {
        return Text::raw("No job selected");
    };
    let dim = Style::default().fg(Color::DarkGray);

    let mut lines: Vec<Line> = Vec::new();

    // Header
    lines.push(Line::from(Span::styled(
        &job.position,
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(format!("at {}", job.company)));
    lines.push(Line::from(Span::styled(
        format!("Status: {}", job.status),
        status_style(job.status),
    )));
    lines.push(Line::from(format!(
        "Applied: {} ({})",
        timeline::format_date(job.applied_date),
        timeline::relative_days(job.applied_date, state.today)
    )));
    if let Some(salary) = &job.salary {
        lines.push(Line::from(format!("Salary: {}", salary)));
    }
    if let Some(location) = &job.location {
        lines.push(Line::from(format!("Location: {}", location)));
    }
    if let Some(url) = &job.job_url {
        lines.push(Line::from(format!("URL: {}", url)));
    }
    lines.push(Line::from(""));

    // Timeline
    lines.push(section("Timeline"));
    for event in timeline::events(job) {
        let style = match event.kind {
            EventKind::Applied | EventKind::InProgress => Style::default().fg(Color::Cyan),
            EventKind::Offer => Style::default().fg(Color::Green),
            EventKind::Rejected => Style::default().fg(Color::Red),
        };
        lines.push(Line::from(vec![
            Span::styled("  o ", style),
            Span::raw(format!(
                "{}  {} - {}",
                event.label,
                timeline::format_date(event.date),
                timeline::relative_days(event.date, state.today)
            )),
        ]));
    }
    lines.push(Line::from(""));

    // Reminders
    let pending = reminders::pending_for_job(&state.reminders, job.id);
    let completed = reminders::completed_for_job(&state.reminders, job.id);
    lines.push(section("Reminders"));
    if pending.is_empty() && completed.is_empty() {
        lines.push(Line::from(Span::styled("  (none)", dim)));
    }
    for reminder in &pending {
        let overdue = reminder.due_date < state.today;
        let style = if overdue { Style::default().fg(Color::Red) } else { Style::default() };
        lines.push(Line::from(Span::styled(
            format!(
                "  [ ] {} ({}, due {})",
                reminder.title,
                reminder.kind,
                timeline::relative_days(reminder.due_date, state.today)
            ),
            style,
        )));
    }
    for reminder in &completed {
        lines.push(Line::from(Span::styled(
            format!("  [x] {}", reminder.title),
            dim,
        )));
    }
    lines.push(Line::from(""));

    // Notes
    let job_notes: Vec<Note> = state
        .notes
        .iter()
        .filter(|note| note.job_id == Some(job.id))
        .cloned()
        .collect();
    lines.push(section("Notes"));
    if job_notes.is_empty() {
        lines.push(Line::from(Span::styled("  (none)", dim)));
    }
    for note in notes::arrange(&job_notes) {
        let marker = if note.pin { "* " } else { "  " };
        lines.push(Line::from(Span::styled(
            format!("{}{}", marker, note.title),
            Style::default().fg(Color::Cyan),
        )));
        for line in textwrap::fill(&note.content, 70).lines() {
            lines.push(Line::from(format!("    {}", line)));
        }
    }

    Text::from(lines)
}
