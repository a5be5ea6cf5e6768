//! # UI Styling Module
//!
//! Button styles shared by the sidebar. Each style is a base color that is
//! lightened on hover and darkened on press.

use iced::widget::button;
use iced::{Background, Border, Color};

const SELECTED_PORT: Color = Color::from_rgb(0.2, 0.6, 0.7);
const IDLE_PORT: Color = Color::from_rgb(0.4, 0.4, 0.4);
const CONNECT: Color = Color::from_rgb(0.2, 0.7, 0.2);
const DISCONNECT: Color = Color::from_rgb(0.8, 0.2, 0.2);

/// Shift every channel by `amount`, clamped to the valid range
fn shade(color: Color, amount: f32) -> Color {
    let shift = |c: f32| (c + amount).clamp(0.0, 1.0);
    Color::from_rgb(shift(color.r), shift(color.g), shift(color.b))
}

fn tone(base: Color, border_width: f32, status: button::Status) -> button::Style {
    let (background, text_color) = match status {
        button::Status::Active => (base, Color::WHITE),
        button::Status::Hovered => (shade(base, 0.1), Color::WHITE),
        button::Status::Pressed => (shade(base, -0.05), Color::WHITE),
        button::Status::Disabled => (shade(base, -0.1), Color::from_rgb(0.6, 0.6, 0.6)),
    };

    button::Style {
        background: Some(Background::Color(background)),
        text_color,
        border: Border {
            color: shade(background, 0.1),
            width: border_width,
            radius: 4.0.into(),
        },
        ..Default::default()
    }
}

/// Style for port list buttons based on selection state
pub fn device_button_style(is_selected: bool) -> impl Fn(&iced::Theme, button::Status) -> button::Style {
    move |_theme: &iced::Theme, status: button::Status| {
        if is_selected {
            tone(SELECTED_PORT, 2.0, status)
        } else {
            tone(IDLE_PORT, 1.0, status)
        }
    }
}

pub fn connect_button_style() -> impl Fn(&iced::Theme, button::Status) -> button::Style {
    |_theme: &iced::Theme, status: button::Status| match status {
        button::Status::Disabled => button::Style::default(),
        _ => tone(CONNECT, 1.0, status),
    }
}

pub fn disconnect_button_style() -> impl Fn(&iced::Theme, button::Status) -> button::Style {
    |_theme: &iced::Theme, status: button::Status| match status {
        button::Status::Disabled => button::Style::default(),
        _ => tone(DISCONNECT, 1.0, status),
    }
}
