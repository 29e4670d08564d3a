use crate::app::{App, Severity};
use crate::util::{format_bytes, format_date};

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Layout, Margin, Rect},
    style::{Color, Style, Stylize},
    symbols::border,
    text::{Line, Text},
    widgets::{
        Block, BorderType, Paragraph, Row, Scrollbar, ScrollbarOrientation, ScrollbarState,
        StatefulWidget, Table, Widget, Wrap,
    },
};

// Helper function for the popups
pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    // raw size
    let raw_w = area.width.saturating_mul(percent_x) / 100;
    let raw_h = area.height.saturating_mul(percent_y) / 100;

    // enforce minimum of 3 (1 border + 1 content + 1 border)
    let w = raw_w.max(3).min(area.width);
    let h = raw_h.max(3).min(area.height);

    // center it in `area`
    let x = area.x + (area.width.saturating_sub(w)) / 2;
    let y = area.y + (area.height.saturating_sub(h)) / 2;

    Rect {
        x,
        y,
        width: w,
        height: h,
    }
}

fn clear_area(area: Rect, buf: &mut Buffer) {
    for y in area.top()..area.bottom() {
        for x in area.left()..area.right() {
            buf[(x, y)].set_char(' ').set_bg(Color::Black);
        }
    }
}

impl Widget for &mut App {
    /// Renders the user interface widgets.
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Set up the three-part layout: gallery, pending uploads, status bar
        let chunks = Layout::vertical([
            Constraint::Min(10),
            Constraint::Length(8),
            Constraint::Length(1),
        ])
        .split(area);

        self.render_gallery(chunks[0], buf);
        self.render_pending(chunks[1], buf);
        self.render_status(chunks[2], buf);

        // Popups on top of everything else
        if self.gallery.preview().is_some() {
            self.render_preview(area, buf);
        }
        if self.show_picker {
            self.render_picker(area, buf);
        }
        if self.show_help {
            render_help(area, buf);
        }
    }
}

impl App {
    fn render_gallery(&mut self, area: Rect, buf: &mut Buffer) {
        // Busy marker in the title
        let title_text = if self.loading {
            format!(" Converted PDFs ({}) - [Loading...] ", self.items.len())
                .bold()
                .blue()
        } else if self.downloading {
            format!(" Converted PDFs ({}) - [Downloading...] ", self.items.len())
                .bold()
                .blue()
        } else {
            format!(" Converted PDFs ({}) ", self.items.len()).bold().blue()
        };

        let instructions = Line::from(
            " Select: <Space> | Preview: <Enter> | Download: <d>/<s>/<z> | Help: <?> "
                .bold()
                .yellow(),
        );

        let table_block = Block::bordered()
            .title(title_text)
            .title_alignment(Alignment::Center)
            .title_bottom(instructions.centered())
            .border_type(BorderType::Rounded);

        if self.items.is_empty() {
            let empty = Paragraph::new(Text::from(vec![
                Line::from(""),
                Line::from("No converted documents yet."),
                Line::from("Press <a> to pick .msg files, then <u> to upload them."),
            ]))
            .alignment(Alignment::Center)
            .block(table_block);
            empty.render(area, buf);
            return;
        }

        let header = Row::new(vec!["", "Name", "Original", "Pages", "Size", "Date", "Sender"])
            .style(Style::default().fg(Color::White).bg(Color::DarkGray).bold());

        let rows: Vec<Row> = self
            .items
            .iter()
            .map(|item| {
                let cells = item.to_row_cells(self.gallery.is_selected(&item.filename));
                Row::new(cells)
            })
            .collect();

        let widths = [
            Constraint::Length(1),      // Selection marker
            Constraint::Percentage(25), // Name
            Constraint::Percentage(25), // Original
            Constraint::Length(5),      // Pages
            Constraint::Percentage(12), // Size
            Constraint::Percentage(16), // Date
            Constraint::Percentage(22), // Sender
        ];

        let table = Table::new(rows, widths)
            .block(table_block)
            .header(header)
            .row_highlight_style(Style::new().reversed())
            .column_spacing(1);

        let cursor = self.table_state.selected().unwrap_or(0);
        StatefulWidget::render(table, area, buf, &mut self.table_state);

        // Add a scrollbar
        let table_scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("↑"))
            .end_symbol(Some("↓"));
        let mut table_scrollbar_state = ScrollbarState::new(self.items.len())
            .position(cursor)
            .viewport_content_length(1);
        StatefulWidget::render(
            table_scrollbar,
            area.inner(Margin {
                vertical: 1,
                horizontal: 0,
            }),
            buf,
            &mut table_scrollbar_state,
        );
    }

    fn render_pending(&mut self, area: Rect, buf: &mut Buffer) {
        let title_text = if self.uploading {
            format!(" Pending uploads ({}) - [Uploading...] ", self.pending.len())
                .bold()
                .blue()
        } else {
            format!(" Pending uploads ({}) ", self.pending.len()).bold().blue()
        };

        let block = Block::bordered()
            .title(title_text)
            .title_alignment(Alignment::Center)
            .title_bottom(
                Line::from(" Add: <a> | Upload: <u> | Remove: <x> | Move: <J>/<K> ".yellow())
                    .centered(),
            )
            .border_type(BorderType::Rounded);

        if self.pending.is_empty() {
            let empty = Paragraph::new(Line::from("Nothing queued."))
                .alignment(Alignment::Center)
                .block(block);
            empty.render(area, buf);
            return;
        }

        let rows: Vec<Row> = self
            .pending
            .files()
            .iter()
            .map(|f| Row::new(vec![f.name.clone(), format_bytes(f.size)]))
            .collect();
        let widths = [Constraint::Percentage(75), Constraint::Percentage(25)];

        let table = Table::new(rows, widths)
            .block(block)
            .row_highlight_style(Style::new().reversed())
            .column_spacing(1);

        StatefulWidget::render(table, area, buf, &mut self.pending_state);
    }

    fn render_status(&self, area: Rect, buf: &mut Buffer) {
        let line = match &self.alert {
            Some(alert) => {
                let style = match alert.severity {
                    Severity::Info => Style::default().fg(Color::Green),
                    Severity::Warning => Style::default().fg(Color::Yellow),
                    Severity::Error => Style::default().fg(Color::Red).bold(),
                };
                Line::from(format!(" {} ", alert.message)).style(style)
            }
            None => Line::from(" Ready ").style(Style::default().fg(Color::DarkGray)),
        };
        Paragraph::new(line).render(area, buf);
    }

    fn render_preview(&self, area: Rect, buf: &mut Buffer) {
        // Preview target is pruned on refresh, so a miss here just skips the
        // dialog for one frame
        let Some(item) = self.preview_item() else {
            return;
        };

        let popup_area = centered_rect(70, 70, area);

        let metadata = &item.metadata;
        let txt = Text::from(vec![
            Line::from(""),
            Line::from(format!(" Page 1 of {}", metadata.page_count)).centered(),
            Line::from(""),
            Line::from(format!(" Original File : {}", item.original_filename)),
            Line::from(format!(
                " Date          : {}",
                metadata.date.as_deref().map(format_date).unwrap_or_else(|| "-".into())
            )),
            Line::from(format!(" Size          : {}", format_bytes(item.size))),
            Line::from(format!(
                " Sender        : {}",
                metadata.sender.as_deref().unwrap_or("-")
            )),
            Line::from(format!(
                " Subject       : {}",
                metadata.subject.as_deref().unwrap_or("-")
            )),
            Line::from(format!(" Recipients    : {}", metadata.recipients.joined())),
            Line::from(format!(" Pages         : {}", item.page_label())),
            Line::from(""),
            Line::from(format!(" Thumbnail     : {}", item.thumbnail_url)),
            Line::from(format!(" Preview       : {}", item.pdf_url)),
        ]);

        let preview_block = Block::bordered()
            .title(Line::from(format!(" {} ", item.filename).bold()))
            .border_set(border::THICK)
            .style(Style::default().bg(Color::Black).fg(Color::White))
            .title_bottom(
                Line::from(" Download: <d> | Close: <q> ").alignment(Alignment::Center),
            );

        let preview = Paragraph::new(txt)
            .block(preview_block)
            .wrap(Wrap { trim: false });

        clear_area(popup_area, buf);
        preview.render(popup_area, buf);
    }

    fn render_picker(&mut self, area: Rect, buf: &mut Buffer) {
        let popup_area = centered_rect(60, 60, area);

        let block = Block::bordered()
            .title(Line::from(format!(" {} ", self.picker_dir.display()).bold()))
            .border_set(border::THICK)
            .style(Style::default().bg(Color::Black).fg(Color::White))
            .title_bottom(
                Line::from(" Add: <Enter> | Add all .msg: <A> | Close: <q> ")
                    .alignment(Alignment::Center),
            );

        let rows: Vec<Row> = self
            .picker_entries
            .iter()
            .map(|e| {
                let kind = if e.is_dir { "Dir" } else { "File" };
                Row::new(vec![e.name.clone(), kind.to_string()])
            })
            .collect();
        let widths = [Constraint::Percentage(85), Constraint::Percentage(15)];

        let table = Table::new(rows, widths)
            .block(block)
            .row_highlight_style(Style::new().reversed())
            .column_spacing(1);

        clear_area(popup_area, buf);
        StatefulWidget::render(table, popup_area, buf, &mut self.picker_state);
    }
}

fn render_help(area: Rect, buf: &mut Buffer) {
    let popup_area = centered_rect(60, 60, area);
    let help_text = Text::from(vec![
        Line::from(" Shortcuts:"),
        Line::from(""),
        Line::from("  j / k   - Move down / up in the gallery"),
        Line::from("  Space   - Select / deselect the highlighted document"),
        Line::from("  Enter   - Preview the highlighted document"),
        Line::from("  a       - Pick .msg files to upload"),
        Line::from("  u       - Upload the queued files"),
        Line::from("  x       - Remove the highlighted queued file"),
        Line::from("  J / K   - Move in the queued file list"),
        Line::from("  d       - Download the highlighted document"),
        Line::from("  s       - Download the selected documents as zip"),
        Line::from("  z       - Download everything as zip (opens browser)"),
        Line::from("  r       - Refresh the document list"),
        Line::from("  q       - Quit (or close this help)"),
        Line::from("  ?       - Show this help"),
    ]);

    let help_block = Block::bordered()
        .title(Line::from(" Help ".bold()))
        .border_set(border::THICK)
        .style(Style::default().bg(Color::Black).fg(Color::White))
        .title_bottom(Line::from(" Close this panel with <q> ").alignment(Alignment::Center));

    let help = Paragraph::new(help_text)
        .block(help_block)
        .wrap(Wrap { trim: false });

    clear_area(popup_area, buf);
    help.render(popup_area, buf);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_rect_respects_minimum() {
        let area = Rect::new(0, 0, 100, 40);
        let rect = centered_rect(1, 1, area);
        assert_eq!(rect.width, 3);
        assert_eq!(rect.height, 3);
    }

    #[test]
    fn test_centered_rect_is_centered() {
        let area = Rect::new(0, 0, 100, 40);
        let rect = centered_rect(50, 50, area);
        assert_eq!(rect.width, 50);
        assert_eq!(rect.height, 20);
        assert_eq!(rect.x, 25);
        assert_eq!(rect.y, 10);
    }
}
