use quick_xml::escape::escape;

use crate::clock::DisplayClock;
use crate::stats::TrackSummary;
use crate::units::{Meters, round2};

pub const NO_TRACKS_HTML: &str = "No GPX files loaded.";

/// A summary rendered for the page and for embedding in exported documents.
/// Both forms carry the same figures, formatted identically.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSummary {
    pub html: String,
    pub text: String,
}

/// `(label, value)` lines shared by both renderings, in display order.
fn summary_lines(summary: &TrackSummary, clock: &DisplayClock) -> Vec<(String, String)> {
    let zone = clock.label();
    let (min_ele, max_ele) = summary.elevation_range;
    vec![
        ("Tracks".to_string(), summary.track_count.to_string()),
        ("Routes".to_string(), summary.route_count.to_string()),
        ("Waypoints".to_string(), summary.waypoint_count.to_string()),
        ("Track Points".to_string(), summary.point_count.to_string()),
        (
            format!("Start Time ({zone})"),
            clock.format_summary(summary.start_time),
        ),
        (
            format!("End Time ({zone})"),
            clock.format_summary(summary.end_time),
        ),
        (
            "Elevation (min → max)".to_string(),
            format!("{} → {}", Meters(min_ele), Meters(max_ele)),
        ),
        (
            "Distance".to_string(),
            summary.total_distance.to_kilometers().to_string(),
        ),
    ]
}

pub fn render(title: &str, summary: &TrackSummary, clock: &DisplayClock) -> RenderedSummary {
    let lines = summary_lines(summary, clock);
    let speeds = summary.speed_range;
    let (min, max, avg) = (
        round2(speeds.min.0),
        round2(speeds.max.0),
        round2(speeds.average.0),
    );

    let mut html = format!("<strong>{}</strong>:<br>\n", escape(title));
    let mut text = format!("{title}:\n");
    for (label, value) in &lines {
        html.push_str(&format!("{label}: {}<br>\n", escape(value.as_str())));
        text.push_str(&format!("{label}: {value}\n"));
    }
    html.push_str(&format!(
        "Speed (km/h):<br>\nMin: {min}<br>\nMax: {max}<br>\nAverage: {avg}<br>"
    ));
    text.push_str(&format!("Speed (km/h): Min: {min}, Max: {max}, Average: {avg}"));

    RenderedSummary { html, text }
}

/// Join the HTML blocks of several tracks for the summary panel.
pub fn join_html<'a>(blocks: impl Iterator<Item = &'a str>) -> String {
    let joined = blocks.collect::<Vec<_>>().join("<hr>");
    if joined.is_empty() {
        NO_TRACKS_HTML.to_string()
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::SpeedRange;
    use crate::units::KilometersPerHour;
    use chrono::{FixedOffset, TimeZone, Utc};

    fn clock() -> DisplayClock {
        DisplayClock::new(FixedOffset::east_opt(330 * 60).unwrap(), "IST")
    }

    fn summary() -> TrackSummary {
        TrackSummary {
            track_count: 1,
            route_count: 0,
            waypoint_count: 2,
            point_count: 3,
            start_time: Some(Utc.with_ymd_and_hms(2025, 1, 1, 6, 0, 0).unwrap()),
            end_time: None,
            elevation_range: (0.0, 10.0),
            speed_range: SpeedRange {
                min: KilometersPerHour(0.0),
                max: KilometersPerHour(40.0302),
                average: KilometersPerHour(26.686_8),
            },
            total_distance: Meters(222.389_853),
        }
    }

    #[test]
    fn test_text_rendering() {
        let r = render("Morning Run", &summary(), &clock());
        let expected = "Morning Run:\n\
Tracks: 1\n\
Routes: 0\n\
Waypoints: 2\n\
Track Points: 3\n\
Start Time (IST): 01 Jan 2025, 11:30:00\n\
End Time (IST): N/A\n\
Elevation (min → max): 0.00 m → 10.00 m\n\
Distance: 0.22 km\n\
Speed (km/h): Min: 0.00, Max: 40.03, Average: 26.69";
        assert_eq!(r.text, expected);
    }

    #[test]
    fn test_html_rendering() {
        let r = render("Morning Run", &summary(), &clock());
        let expected = "<strong>Morning Run</strong>:<br>\n\
Tracks: 1<br>\n\
Routes: 0<br>\n\
Waypoints: 2<br>\n\
Track Points: 3<br>\n\
Start Time (IST): 01 Jan 2025, 11:30:00<br>\n\
End Time (IST): N/A<br>\n\
Elevation (min → max): 0.00 m → 10.00 m<br>\n\
Distance: 0.22 km<br>\n\
Speed (km/h):<br>\n\
Min: 0.00<br>\n\
Max: 40.03<br>\n\
Average: 26.69<br>";
        assert_eq!(r.html, expected);
    }

    #[test]
    fn test_html_rendering_order_and_escaping() {
        let r = render("A <b> & C", &summary(), &clock());
        assert!(r.html.starts_with("<strong>A &lt;b&gt; &amp; C</strong>:<br>"));
        let order = [
            "Tracks:",
            "Routes:",
            "Waypoints:",
            "Track Points:",
            "Start Time (IST):",
            "End Time (IST):",
            "Elevation",
            "Distance:",
            "Min:",
            "Max:",
            "Average:",
        ];
        let mut last = 0;
        for label in order {
            let at = r.html.find(label).unwrap();
            assert!(at >= last, "{label} out of order");
            last = at;
        }
    }

    #[test]
    fn test_both_forms_carry_same_figures() {
        let r = render("Run", &summary(), &clock());
        for figure in ["0.22 km", "40.03", "26.69", "0.00 m", "10.00 m", "11:30:00"] {
            assert!(r.html.contains(figure), "html lacks {figure}");
            assert!(r.text.contains(figure), "text lacks {figure}");
        }
    }

    #[test]
    fn test_join_html() {
        assert_eq!(join_html(std::iter::empty()), NO_TRACKS_HTML);
        assert_eq!(join_html(["a", "b"].into_iter()), "a<hr>b");
    }
}
