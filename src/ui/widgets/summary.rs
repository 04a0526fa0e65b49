use crate::feeds::{CardRef, FeedSnapshot};
use crate::settings::PersistedSettings;
use chrono::Local;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

pub const DRAWER_TITLE: &str = "AICC New Cards Daily Summary";
pub const EMPTY_TEXT: &str = "No summary data loaded.";

/// Lines for the latest and trending sections, shared by the drawer, the popup
/// and the console output.
pub fn summary_lines(snapshot: Option<&FeedSnapshot>) -> Vec<Line<'_>> {
    let Some(snapshot) = snapshot else {
        return vec![Line::from(Span::styled(
            EMPTY_TEXT,
            Style::default().fg(Color::DarkGray),
        ))];
    };

    let mut lines = section(
        "📅 Latest Cards",
        snapshot.latest_cards(),
        &snapshot.summary,
        "[o] See Latest Cards",
    );

    if let Some(trending) = snapshot.trending() {
        lines.push(Line::from(Span::styled(
            "────────────────────────",
            Style::default().fg(Color::DarkGray),
        )));
        lines.extend(section(
            "🔥 Trending Cards",
            trending.cards,
            trending.summary,
            "[t] See Trending Cards",
        ));
    }

    lines
}

fn section<'a>(
    heading: &'static str,
    cards: &'a [CardRef],
    summary: &'a str,
    link_hint: &'static str,
) -> Vec<Line<'a>> {
    let mut lines = vec![Line::from(Span::styled(
        heading,
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    ))];

    for card in cards {
        lines.push(Line::from(vec![
            Span::styled("  ▪ ", Style::default().fg(Color::Yellow)),
            Span::styled(card.title.as_str(), Style::default().fg(Color::White)),
        ]));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(summary));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        link_hint,
        Style::default().fg(Color::Green),
    )));
    lines.push(Line::from(""));
    lines
}

/// Flatten styled lines into plain text, one line per row.
pub fn plain_text(lines: &[Line<'_>]) -> String {
    lines
        .iter()
        .map(|line| {
            line.spans
                .iter()
                .map(|span| span.content.as_ref())
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct SummaryDrawer<'a> {
    pub snapshot: Option<&'a FeedSnapshot>,
    pub settings: &'a PersistedSettings,
    pub button_label: &'a str,
    pub button_idle: bool,
    pub expanded: bool,
}

impl SummaryDrawer<'_> {
    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let indicator = if self.expanded { "▾" } else { "▸" };
        let block = Block::default()
            .title(format!(" {} {} ", indicator, DRAWER_TITLE))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));

        if !self.expanded {
            frame.render_widget(block, area);
            return;
        }

        let inner = block.inner(area);
        frame.render_widget(block, area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(0)])
            .split(inner);

        frame.render_widget(Paragraph::new(self.control_lines()), chunks[0]);

        let summary = Paragraph::new(summary_lines(self.snapshot))
            .block(Block::default().borders(Borders::TOP))
            .wrap(Wrap { trim: false });
        frame.render_widget(summary, chunks[1]);
    }

    fn control_lines(&self) -> Vec<Line<'_>> {
        let checkbox = if self.settings.show_new_cards_popup {
            "[x]"
        } else {
            "[ ]"
        };

        let button_style = if self.button_idle {
            Style::default().fg(Color::Black).bg(Color::Cyan)
        } else {
            Style::default().fg(Color::Black).bg(Color::DarkGray)
        };

        let last_fetched = match self.settings.last_fetched_date {
            Some(date) => date
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
                .to_string(),
            None => "never".to_string(),
        };

        vec![
            Line::from(vec![
                Span::styled("p ", Style::default().fg(Color::DarkGray)),
                Span::styled(checkbox, Style::default().fg(Color::Yellow)),
                Span::raw(" Show popup when new cards are available"),
            ]),
            Line::from(vec![
                Span::styled("r ", Style::default().fg(Color::DarkGray)),
                Span::styled(format!(" {} ", self.button_label), button_style),
            ]),
            Line::from(Span::styled(
                format!("Last fetched: {}", last_fetched),
                Style::default().fg(Color::DarkGray),
            )),
        ]
    }
}
