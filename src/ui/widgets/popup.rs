use super::center_rect;
use super::summary::summary_lines;
use crate::feeds::FeedSnapshot;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

pub const POPUP_TITLE: &str = "AICC Daily Update";
pub const POPUP_HEADLINE: &str = "New AI Character Cards Available!";

pub struct NotificationPopup<'a> {
    pub snapshot: &'a FeedSnapshot,
}

impl NotificationPopup<'_> {
    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let modal_area = center_rect(70, 80, area);
        frame.render_widget(Clear, modal_area);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(format!(" {} ", POPUP_TITLE));

        let mut lines = vec![
            Line::from(Span::styled(
                POPUP_HEADLINE,
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
        ];
        lines.extend(summary_lines(Some(self.snapshot)));
        lines.push(Line::from(Span::styled(
            "Enter: Got it! | o: latest | t: trending",
            Style::default().fg(Color::DarkGray),
        )));

        let paragraph = Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, modal_area);
    }
}
