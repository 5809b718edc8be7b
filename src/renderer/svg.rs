//! SVG generation from a routed instance

use crate::routing::{BoundingBox, Connection, End, Instance, Point};

use super::SvgConfig;

/// Build SVG elements incrementally
pub struct SvgBuilder {
    config: SvgConfig,
    elements: Vec<String>,
    overlay: Vec<String>,
    connections: Vec<String>,
    indent: usize,
}

impl SvgBuilder {
    pub fn new(config: SvgConfig) -> Self {
        Self {
            config,
            elements: vec![],
            overlay: vec![],
            connections: vec![],
            indent: 1,
        }
    }

    fn prefix(&self) -> String {
        self.config.class_prefix.clone().unwrap_or_default()
    }

    fn indent_str(&self) -> String {
        if self.config.pretty_print {
            "  ".repeat(self.indent)
        } else {
            String::new()
        }
    }

    fn newline(&self) -> &str {
        if self.config.pretty_print {
            "\n"
        } else {
            ""
        }
    }

    /// Add a layer rectangle, optionally labelled at its center
    pub fn add_layer(&mut self, name: &str, bounds: BoundingBox) {
        let prefix = self.prefix();
        let name = escape_xml(name);
        self.elements.push(format!(
            r#"{}<rect id="{}" class="{}layer" x="{}" y="{}" width="{}" height="{}"/>"#,
            self.indent_str(),
            name,
            prefix,
            bounds.x,
            bounds.y,
            bounds.width,
            bounds.height
        ));

        if self.config.show_labels {
            let center = bounds.center();
            self.elements.push(format!(
                r#"{}<text class="{}label" x="{}" y="{}" text-anchor="middle" dominant-baseline="middle">{}</text>"#,
                self.indent_str(),
                prefix,
                center.x,
                center.y,
                name
            ));
        }
    }

    /// Add one non-walkable grid cell to the occupancy overlay
    pub fn add_blocked_cell(&mut self, position: Point, size: f64) {
        let prefix = self.prefix();
        self.overlay.push(format!(
            r#"{}<rect class="{}blocked" x="{}" y="{}" width="{}" height="{}"/>"#,
            self.indent_str(),
            prefix,
            position.x,
            position.y,
            size,
            size
        ));
    }

    /// Add the line path of a connection
    pub fn add_connection_path(&mut self, id: &str, path: &[Point]) {
        let prefix = self.prefix();
        self.connections.push(format!(
            r#"{}<path id="{}" class="{}connection" d="{}" fill="none"/>"#,
            self.indent_str(),
            escape_xml(id),
            prefix,
            path_to_d(path)
        ));
    }

    /// Add the stub joining an endpoint to the first or last path point
    pub fn add_endpoint_stub(&mut self, from: Point, to: Point, end: End) {
        let prefix = self.prefix();
        let end_class = match end {
            End::Source => "source",
            End::Target => "target",
        };
        self.connections.push(format!(
            r#"{}<line class="{}endpoint {}{}" x1="{}" y1="{}" x2="{}" y2="{}"/>"#,
            self.indent_str(),
            prefix,
            prefix,
            end_class,
            from.x,
            from.y,
            to.x,
            to.y
        ));
    }

    /// Build the final SVG string
    pub fn build(self, viewbox: BoundingBox) -> String {
        let padding = self.config.viewbox_padding;
        let vb = viewbox.inflate(padding);
        let nl = self.newline();
        let prefix = self.prefix();

        let mut svg = String::new();

        if self.config.standalone {
            svg.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
            svg.push_str(nl);
        }

        svg.push_str(&format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="{} {} {} {}">"#,
            vb.x, vb.y, vb.width, vb.height
        ));
        svg.push_str(nl);

        for elem in &self.elements {
            svg.push_str(elem);
            svg.push_str(nl);
        }

        // The overlay sits above the layers so blocked cells stay visible
        if !self.overlay.is_empty() {
            svg.push_str(&format!(r#"{}<g class="{}overlay">"#, self.indent_str(), prefix));
            svg.push_str(nl);
            for cell in &self.overlay {
                if self.config.pretty_print {
                    svg.push_str("  ");
                }
                svg.push_str(cell);
                svg.push_str(nl);
            }
            svg.push_str(&format!("{}</g>", self.indent_str()));
            svg.push_str(nl);
        }

        for conn in &self.connections {
            svg.push_str(conn);
            svg.push_str(nl);
        }

        svg.push_str("</svg>");

        svg
    }
}

/// Render the layers, visible connections and, when toggled on, the
/// occupancy overlay of an instance
pub fn render_svg(instance: &Instance, config: &SvgConfig) -> String {
    let mut builder = SvgBuilder::new(config.clone());
    let mut content: Option<BoundingBox> = None;
    let mut include = |bounds: BoundingBox| {
        content = Some(match content {
            Some(c) => c.union(&bounds),
            None => bounds,
        });
    };

    for (_, layer) in instance.layers() {
        builder.add_layer(layer.name(), layer.bounds());
        include(layer.bounds());
    }

    if instance.overlay_visible() {
        let grid = instance.grid();
        let scale = grid.scale() as f64;
        for cell in grid.cells().filter(|c| !c.walkable) {
            builder.add_blocked_cell(cell.position(), scale);
        }
        include(grid.area());
    }

    for connection in instance.connections() {
        if connection.is_hidden() || !connection.is_routed() {
            continue;
        }
        for point in render_connection(connection, &mut builder) {
            include(BoundingBox::new(point.x, point.y, 0.0, 0.0));
        }
    }

    builder.build(content.unwrap_or_default())
}

/// Emit a connection and return every point it touches
fn render_connection(connection: &Connection, builder: &mut SvgBuilder) -> Vec<Point> {
    let path = connection.positions();
    let id = format!("connection-{}", connection.id().0);
    builder.add_connection_path(&id, &path);

    let mut touched = path.clone();
    let ends = [
        (End::Source, path.first()),
        (End::Target, path.last()),
    ];
    for (end, point) in ends {
        if let (Some(endpoint), Some(point)) = (connection.endpoint(end), point) {
            if endpoint.position != *point {
                builder.add_endpoint_stub(endpoint.position, *point, end);
            }
            touched.push(endpoint.position);
        }
    }
    touched
}

/// Convert a path of points to an SVG path d attribute
fn path_to_d(path: &[Point]) -> String {
    let mut points = path.iter();
    let Some(first) = points.next() else {
        return String::new();
    };

    let mut d = format!("M{} {}", first.x, first.y);
    for point in points {
        d.push_str(&format!(" L{} {}", point.x, point.y));
    }
    d
}

/// Escape special XML characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::RouterConfig;

    fn side_by_side() -> Instance {
        let mut inst = Instance::new(RouterConfig::default()).unwrap();
        let a = inst
            .create_layer("a", BoundingBox::new(0.0, 0.0, 100.0, 50.0))
            .unwrap();
        let b = inst
            .create_layer("b", BoundingBox::new(300.0, 0.0, 100.0, 50.0))
            .unwrap();
        inst.connect(a, b).unwrap();
        inst
    }

    #[test]
    fn test_path_to_d() {
        let path = vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 100.0),
        ];
        assert_eq!(path_to_d(&path), "M0 0 L100 0 L100 100");
        assert_eq!(path_to_d(&[]), "");
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a < b"), "a &lt; b");
        assert_eq!(escape_xml("a & b"), "a &amp; b");
        assert_eq!(escape_xml("<tag>"), "&lt;tag&gt;");
    }

    #[test]
    fn test_render_empty_instance() {
        let inst = Instance::new(RouterConfig::default()).unwrap();
        let svg = render_svg(&inst, &SvgConfig::default().with_viewbox_padding(0.0));
        assert!(svg.contains(r#"viewBox="0 0 0 0""#));
        assert!(svg.ends_with("</svg>"));
    }

    #[test]
    fn test_render_layers_and_connection() {
        let svg = render_svg(&side_by_side(), &SvgConfig::default());

        assert!(svg.starts_with("<?xml"));
        assert!(svg.contains(r#"viewBox="-20 -20 440 90""#));
        assert!(svg.contains(
            r#"<rect id="a" class="oc-layer" x="0" y="0" width="100" height="50"/>"#
        ));
        assert!(svg.contains(r#">b</text>"#));
        assert!(svg.contains(r#"class="oc-connection" d="M145 25 L255 25""#));
        assert!(svg.contains(
            r#"<line class="oc-endpoint oc-source" x1="100" y1="25" x2="145" y2="25"/>"#
        ));
        assert!(svg.contains(
            r#"<line class="oc-endpoint oc-target" x1="300" y1="25" x2="255" y2="25"/>"#
        ));
        assert!(!svg.contains("oc-overlay"));
    }

    #[test]
    fn test_render_compact_without_prefix() {
        let config = SvgConfig::new()
            .with_pretty_print(false)
            .with_standalone(false)
            .with_labels(false)
            .without_class_prefix();
        let svg = render_svg(&side_by_side(), &config);

        assert!(!svg.contains('\n'));
        assert!(svg.starts_with("<svg"));
        assert!(!svg.contains("<text"));
        assert!(svg.contains(r#"class="connection""#));
    }

    #[test]
    fn test_custom_class_prefix() {
        let config = SvgConfig::new().with_class_prefix("net-");
        let svg = render_svg(&side_by_side(), &config);

        assert!(svg.contains(r#"class="net-layer""#));
        assert!(svg.contains(r#"class="net-endpoint net-source""#));
        assert!(!svg.contains("oc-"));
    }

    #[test]
    fn test_hidden_connections_are_skipped() {
        let mut inst = side_by_side();
        let b = inst.layer_id("b").unwrap();
        inst.begin_layer_move(b).unwrap();

        let svg = render_svg(&inst, &SvgConfig::default());
        assert!(!svg.contains("oc-connection"));
        assert!(!svg.contains("oc-endpoint"));
        assert!(svg.contains(r#"id="b""#));
    }

    #[test]
    fn test_overlay_draws_blocked_cells() {
        let mut inst = side_by_side();
        assert!(inst.toggle_occupancy_overlay());

        let svg = render_svg(&inst, &SvgConfig::default());
        assert!(svg.contains(r#"<g class="oc-overlay">"#));
        assert_eq!(
            svg.matches("oc-blocked").count(),
            inst.grid().blocked_count()
        );
    }

    #[test]
    fn test_layer_names_are_escaped() {
        let mut inst = Instance::new(RouterConfig::default()).unwrap();
        inst.create_layer("a&b", BoundingBox::new(0.0, 0.0, 10.0, 10.0))
            .unwrap();
        let svg = render_svg(&inst, &SvgConfig::default());
        assert!(svg.contains(r#"id="a&amp;b""#));
        assert!(svg.contains(">a&amp;b</text>"));
    }
}
