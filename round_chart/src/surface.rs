// surface.rs - executes draw commands on an egui painter

use egui::{Align2, Color32, FontId, Painter, Pos2, Rect, Shape, Stroke};

use crate::app::render::{Align, Color, DrawCommand, Paint};
use crate::grid::Bounds;
use crate::mapper::Point;

fn color32(c: Color) -> Color32 {
    Color32::from_rgba_unmultiplied(c.r, c.g, c.b, c.a)
}

fn pos(origin: Pos2, p: Point) -> Pos2 {
    Pos2::new(origin.x + p.x, origin.y + p.y)
}

fn rect(origin: Pos2, b: &Bounds) -> Rect {
    Rect::from_min_max(
        Pos2::new(origin.x + b.left, origin.y + b.top),
        Pos2::new(origin.x + b.right, origin.y + b.bottom),
    )
}

fn anchor(align: Align) -> Align2 {
    match align {
        Align::Left => Align2::LEFT_CENTER,
        Align::Center => Align2::CENTER_CENTER,
        Align::Right => Align2::RIGHT_CENTER,
    }
}

/// Paint `commands` with canvas (0, 0) at `origin`.
pub fn paint(painter: &Painter, origin: Pos2, commands: &[DrawCommand]) {
    for cmd in commands {
        match cmd {
            DrawCommand::Clear {
                width,
                height,
                color,
            } => {
                let r = Rect::from_min_size(origin, egui::vec2(*width, *height));
                painter.rect_filled(r, 0.0, color32(*color));
            }
            DrawCommand::Line {
                from,
                to,
                width,
                color,
                dash,
            } => {
                let stroke = Stroke::new(*width, color32(*color));
                let pts = [pos(origin, *from), pos(origin, *to)];
                match dash {
                    Some((on, off)) => painter.extend(Shape::dashed_line(&pts, stroke, *on, *off)),
                    None => {
                        painter.line_segment(pts, stroke);
                    }
                }
            }
            DrawCommand::Polyline {
                points,
                width,
                paint,
            } => {
                if points.len() < 2 {
                    continue;
                }
                match paint {
                    Paint::Solid(c) => {
                        let pts: Vec<Pos2> = points.iter().map(|p| pos(origin, *p)).collect();
                        painter.add(Shape::line(pts, Stroke::new(*width, color32(*c))));
                    }
                    // one segment per colour; round caps keep the joints closed
                    Paint::Gradient(g) => {
                        for pair in points.windows(2) {
                            let mid = (pair[0].x + pair[1].x) * 0.5;
                            let stroke = Stroke::new(*width, color32(g.color_at(mid)));
                            let a = pos(origin, pair[0]);
                            let b = pos(origin, pair[1]);
                            painter.line_segment([a, b], stroke);
                            painter.circle_filled(b, *width * 0.5, stroke.color);
                        }
                    }
                }
            }
            DrawCommand::FillRect { bounds, color } => {
                painter.rect_filled(rect(origin, bounds), 0.0, color32(*color));
            }
            DrawCommand::StrokeRect {
                bounds,
                width,
                color,
            } => {
                painter.rect_stroke(
                    rect(origin, bounds),
                    0.0,
                    Stroke::new(*width, color32(*color)),
                );
            }
            DrawCommand::Circle {
                center,
                radius,
                color,
            } => {
                painter.circle_filled(pos(origin, *center), *radius, color32(*color));
            }
            DrawCommand::Text {
                pos: p,
                text,
                size,
                color,
                align,
            } => {
                painter.text(
                    pos(origin, *p),
                    anchor(*align),
                    text,
                    FontId::proportional(*size),
                    color32(*color),
                );
            }
        }
    }
}
