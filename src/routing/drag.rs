//! Pointer drag sessions
//!
//! A [`DragSession`] remembers what the pointer is currently dragging. It is
//! owned by the input layer; starting a new interaction replaces the target.

use log::debug;

use super::connection::{DragReport, End};
use super::error::RoutingError;
use super::instance::{ConnectionHandle, Instance, LineRef};
use super::types::{ConnectionId, LayerId, Point};

/// Everything a pointer can drag
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragTarget {
    Line(LineRef),
    Endpoint {
        connection: ConnectionId,
        end: End,
    },
    /// View panning; the offset follows the pointer from where it started
    PanGesture {
        origin: Point,
        initial_offset: Point,
    },
    /// A rubber band from a layer to the pointer
    ConnectionDraft {
        source: LayerId,
        cursor: Point,
    },
    /// A layer following the pointer; its connections are hidden meanwhile
    LayerMoveDraft {
        layer: LayerId,
        grab_offset: Point,
    },
}

/// Result of feeding one pointer event into a session
#[derive(Debug, Clone, PartialEq)]
pub enum DragOutcome {
    /// Nothing is being dragged
    Idle,
    Path(DragReport),
    Panned(Point),
    Draft(Point),
    LayerMoved(Point),
    Connected(ConnectionHandle),
    Released,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DragSession {
    target: Option<DragTarget>,
}

impl DragSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self) -> Option<&DragTarget> {
        self.target.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.target.is_some()
    }

    /// Start dragging `target`, ending whatever was dragged before
    pub fn begin(&mut self, instance: &mut Instance, target: DragTarget) -> Result<(), RoutingError> {
        if let Some(DragTarget::LayerMoveDraft { layer, .. }) = self.target.take() {
            instance.finish_layer_move(layer)?;
        }
        if let DragTarget::LayerMoveDraft { layer, .. } = target {
            instance.begin_layer_move(layer)?;
        }
        debug!("drag begins on {:?}", target);
        self.target = Some(target);
        Ok(())
    }

    /// Start panning from `origin` at the instance's current offset
    pub fn begin_pan(&mut self, instance: &mut Instance, origin: Point) -> Result<(), RoutingError> {
        let initial_offset = instance.view_offset();
        self.begin(
            instance,
            DragTarget::PanGesture {
                origin,
                initial_offset,
            },
        )
    }

    /// Feed a pointer move
    pub fn drag(&mut self, instance: &mut Instance, pointer: Point) -> Result<DragOutcome, RoutingError> {
        let Some(target) = self.target else {
            return Ok(DragOutcome::Idle);
        };
        match target {
            DragTarget::Line(line) => {
                let report = instance.drag_line(line, pointer)?;
                if report.flipped.is_some() {
                    self.target = None;
                } else {
                    let remapped = report.remap(line.line);
                    if remapped != line.line {
                        debug!("drag moves from collapsed {:?} to {:?}", line.line, remapped);
                        self.target = Some(DragTarget::Line(LineRef {
                            connection: line.connection,
                            line: remapped,
                        }));
                    }
                }
                Ok(DragOutcome::Path(report))
            }
            DragTarget::Endpoint { connection, end } => {
                let report = instance.drag_endpoint(connection, end, pointer)?;
                if report.flipped.is_some() {
                    self.target = None;
                }
                Ok(DragOutcome::Path(report))
            }
            DragTarget::PanGesture {
                origin,
                initial_offset,
            } => {
                let offset = Point::new(
                    initial_offset.x + pointer.x - origin.x,
                    initial_offset.y + pointer.y - origin.y,
                );
                instance.set_view_offset(offset);
                Ok(DragOutcome::Panned(offset))
            }
            DragTarget::ConnectionDraft { source, .. } => {
                self.target = Some(DragTarget::ConnectionDraft {
                    source,
                    cursor: pointer,
                });
                Ok(DragOutcome::Draft(pointer))
            }
            DragTarget::LayerMoveDraft { layer, grab_offset } => {
                let position = Point::new(pointer.x - grab_offset.x, pointer.y - grab_offset.y);
                instance.move_layer_draft(layer, position)?;
                Ok(DragOutcome::LayerMoved(position))
            }
        }
    }

    /// Feed the pointer release; the session is empty afterwards
    pub fn release(
        &mut self,
        instance: &mut Instance,
        pointer: Point,
    ) -> Result<DragOutcome, RoutingError> {
        let Some(target) = self.target.take() else {
            return Ok(DragOutcome::Idle);
        };
        match target {
            DragTarget::ConnectionDraft { source, .. } => match instance.hit_test(pointer) {
                Some(layer) if layer != source => {
                    let handle = instance.connect(source, layer)?;
                    Ok(DragOutcome::Connected(handle))
                }
                _ => Ok(DragOutcome::Released),
            },
            DragTarget::LayerMoveDraft { layer, grab_offset } => {
                let position = Point::new(pointer.x - grab_offset.x, pointer.y - grab_offset.y);
                instance.move_layer_draft(layer, position)?;
                instance.finish_layer_move(layer)?;
                Ok(DragOutcome::Released)
            }
            _ => Ok(DragOutcome::Released),
        }
    }

    /// Drop the target without committing anything
    pub fn cancel(&mut self) {
        self.target = None;
    }
}
