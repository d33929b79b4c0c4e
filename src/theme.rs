use ratatui::style::Color;

/// A named colour palette for the whole UI.
#[derive(Debug)]
pub struct Theme {
  pub name: &'static str,
  pub bg: Color,
  pub fg: Color,
  pub muted: Color,
  pub dim: Color,
  pub accent: Color,
  pub border: Color,
  pub focus: Color,
  pub overlay_bg: Color,
  pub badge_fg: Color,
  pub badge_bg: Color,
  pub status: Color,
  pub error: Color,
  pub key_fg: Color,
  pub key_bg: Color,
}

pub static THEMES: [Theme; 3] = [
  Theme {
    name: "midnight",
    bg: Color::Rgb(15, 17, 21),
    fg: Color::Rgb(240, 242, 245),
    muted: Color::Rgb(130, 138, 150),
    dim: Color::Rgb(70, 76, 86),
    accent: Color::Rgb(255, 78, 69),
    border: Color::Rgb(45, 50, 60),
    focus: Color::Rgb(99, 140, 255),
    overlay_bg: Color::Rgb(24, 27, 33),
    badge_fg: Color::Rgb(240, 242, 245),
    badge_bg: Color::Rgb(0, 0, 0),
    status: Color::Rgb(236, 196, 94),
    error: Color::Rgb(255, 99, 99),
    key_fg: Color::Rgb(15, 17, 21),
    key_bg: Color::Rgb(130, 138, 150),
  },
  Theme {
    name: "paper",
    bg: Color::Rgb(250, 248, 242),
    fg: Color::Rgb(30, 30, 30),
    muted: Color::Rgb(110, 110, 110),
    dim: Color::Rgb(190, 188, 180),
    accent: Color::Rgb(204, 0, 0),
    border: Color::Rgb(210, 206, 196),
    focus: Color::Rgb(40, 90, 200),
    overlay_bg: Color::Rgb(255, 255, 255),
    badge_fg: Color::Rgb(255, 255, 255),
    badge_bg: Color::Rgb(30, 30, 30),
    status: Color::Rgb(160, 110, 0),
    error: Color::Rgb(190, 30, 30),
    key_fg: Color::Rgb(250, 248, 242),
    key_bg: Color::Rgb(110, 110, 110),
  },
  Theme {
    name: "terminal",
    bg: Color::Reset,
    fg: Color::Reset,
    muted: Color::DarkGray,
    dim: Color::DarkGray,
    accent: Color::Red,
    border: Color::Gray,
    focus: Color::Cyan,
    overlay_bg: Color::Black,
    badge_fg: Color::White,
    badge_bg: Color::Black,
    status: Color::Yellow,
    error: Color::LightRed,
    key_fg: Color::Black,
    key_bg: Color::Gray,
  },
];

/// Index of the theme called `name`, falling back to the first.
pub fn theme_index(name: Option<&str>) -> usize {
  name.and_then(|n| THEMES.iter().position(|t| t.name == n)).unwrap_or(0)
}
