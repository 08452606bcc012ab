use crate::components::{
    ComponentBounds, ComponentProperties, DisplayFlags, Drawable3D, DrawableKind, Material,
    RenderHints, Transform, Visibility,
};
use crate::entity::EntityId;

/// Column store for scene entities.
///
/// Every component lives in its own `Vec<Option<_>>` indexed by entity, so
/// iteration order is always spawn order.
#[derive(Debug, Default)]
pub struct World {
    next_index: u32,
    names: Vec<Option<String>>,
    parents: Vec<Option<EntityId>>,
    transforms: Vec<Option<Transform>>,
    bounds: Vec<Option<ComponentBounds>>,
    visibility: Vec<Option<Visibility>>,
    drawables: Vec<Option<Drawable3D>>,
    materials: Vec<Option<Material>>,
    properties: Vec<Option<ComponentProperties>>,
    display_flags: Vec<Option<DisplayFlags>>,
    render_hints: Vec<Option<RenderHints>>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.next_index as usize
    }

    pub fn is_empty(&self) -> bool {
        self.next_index == 0
    }

    pub fn spawn(&mut self) -> EntityId {
        let id = EntityId(self.next_index);
        self.next_index += 1;
        self.ensure_capacity(id.index() as usize);
        id
    }

    /// Spawn a named entity under `parent` with an identity transform.
    pub fn spawn_child(&mut self, name: impl Into<String>, parent: Option<EntityId>) -> EntityId {
        let id = self.spawn();
        self.set_name(id, name);
        if let Some(parent) = parent {
            self.set_parent(id, parent);
        }
        self.set_transform(id, Transform::identity());
        id
    }

    pub fn set_name(&mut self, entity: EntityId, name: impl Into<String>) {
        self.ensure_capacity(entity.index() as usize);
        self.names[entity.index() as usize] = Some(name.into());
    }

    pub fn set_parent(&mut self, entity: EntityId, parent: EntityId) {
        self.ensure_capacity(entity.index() as usize);
        self.parents[entity.index() as usize] = Some(parent);
    }

    pub fn set_transform(&mut self, entity: EntityId, transform: Transform) {
        self.ensure_capacity(entity.index() as usize);
        self.transforms[entity.index() as usize] = Some(transform);
    }

    pub fn set_bounds(&mut self, entity: EntityId, bounds: ComponentBounds) {
        self.ensure_capacity(entity.index() as usize);
        self.bounds[entity.index() as usize] = Some(bounds);
    }

    pub fn set_visibility(&mut self, entity: EntityId, visibility: Visibility) {
        self.ensure_capacity(entity.index() as usize);
        self.visibility[entity.index() as usize] = Some(visibility);
    }

    pub fn set_drawable(&mut self, entity: EntityId, drawable: Drawable3D) {
        self.ensure_capacity(entity.index() as usize);
        self.drawables[entity.index() as usize] = Some(drawable);
    }

    pub fn set_material(&mut self, entity: EntityId, material: Material) {
        self.ensure_capacity(entity.index() as usize);
        self.materials[entity.index() as usize] = Some(material);
    }

    pub fn set_properties(&mut self, entity: EntityId, properties: ComponentProperties) {
        self.ensure_capacity(entity.index() as usize);
        self.properties[entity.index() as usize] = Some(properties);
    }

    pub fn set_render_hints(&mut self, entity: EntityId, hints: RenderHints) {
        self.ensure_capacity(entity.index() as usize);
        self.render_hints[entity.index() as usize] = Some(hints);
    }

    pub fn name(&self, entity: EntityId) -> Option<&str> {
        cell(&self.names, entity).and_then(|n| n.as_deref())
    }

    pub fn parent(&self, entity: EntityId) -> Option<EntityId> {
        cell(&self.parents, entity).and_then(|p| *p)
    }

    pub fn transform(&self, entity: EntityId) -> Option<Transform> {
        cell(&self.transforms, entity).and_then(|t| *t)
    }

    pub fn bounds(&self, entity: EntityId) -> Option<ComponentBounds> {
        cell(&self.bounds, entity).and_then(|b| *b)
    }

    pub fn drawable(&self, entity: EntityId) -> Option<&Drawable3D> {
        cell(&self.drawables, entity).and_then(|d| d.as_ref())
    }

    pub fn material(&self, entity: EntityId) -> Option<&Material> {
        cell(&self.materials, entity).and_then(|m| m.as_ref())
    }

    pub fn properties(&self, entity: EntityId) -> Option<&ComponentProperties> {
        cell(&self.properties, entity).and_then(|p| p.as_ref())
    }

    pub fn render_hints(&self, entity: EntityId) -> RenderHints {
        cell(&self.render_hints, entity)
            .and_then(|h| *h)
            .unwrap_or_default()
    }

    pub fn display_flags(&self, entity: EntityId) -> DisplayFlags {
        cell(&self.display_flags, entity)
            .and_then(|f| *f)
            .unwrap_or_default()
    }

    /// Mutable per-entity display flags, created on first access.
    pub fn display_flags_mut(&mut self, entity: EntityId) -> &mut DisplayFlags {
        let idx = entity.index() as usize;
        self.ensure_capacity(idx);
        self.display_flags[idx].get_or_insert_with(DisplayFlags::default)
    }

    pub fn is_visible(&self, entity: EntityId) -> bool {
        cell(&self.visibility, entity)
            .and_then(|v| *v)
            .map(|v| v.visible)
            .unwrap_or(true)
    }

    /// Direct children of `parent`, in spawn order.
    pub fn children(&self, parent: EntityId) -> Vec<EntityId> {
        self.parents
            .iter()
            .enumerate()
            .filter(|(_, p)| **p == Some(parent))
            .map(|(idx, _)| EntityId(idx as u32))
            .collect()
    }

    /// First entity carrying `name`, in spawn order.
    pub fn find_by_name(&self, name: &str) -> Option<EntityId> {
        self.names
            .iter()
            .position(|n| n.as_deref() == Some(name))
            .map(|idx| EntityId(idx as u32))
    }

    /// Visible drawables with their transforms, in spawn order.
    pub fn drawables(&self) -> Vec<(EntityId, Transform, &Drawable3D)> {
        let mut out = Vec::new();
        for (idx, drawable) in self.drawables.iter().enumerate() {
            let Some(drawable) = drawable else { continue };
            let entity = EntityId(idx as u32);
            let Some(transform) = self.transform(entity) else {
                continue;
            };
            if !self.is_visible(entity) {
                continue;
            }
            out.push((entity, transform, drawable));
        }
        out
    }

    pub fn drawables_of_kind(&self, kind: DrawableKind) -> Vec<EntityId> {
        self.drawables()
            .into_iter()
            .filter(|(_, _, d)| d.kind() == kind)
            .map(|(e, _, _)| e)
            .collect()
    }

    fn ensure_capacity(&mut self, idx: usize) {
        if self.transforms.len() <= idx {
            let new_len = idx + 1;
            self.names.resize(new_len, None);
            self.parents.resize(new_len, None);
            self.transforms.resize(new_len, None);
            self.bounds.resize(new_len, None);
            self.visibility.resize(new_len, None);
            self.drawables.resize(new_len, None);
            self.materials.resize(new_len, None);
            self.properties.resize(new_len, None);
            self.display_flags.resize(new_len, None);
            self.render_hints.resize(new_len, None);
        }
    }
}

fn cell<T>(col: &[Option<T>], entity: EntityId) -> Option<&Option<T>> {
    col.get(entity.index() as usize)
}

#[cfg(test)]
mod tests {
    use super::World;
    use crate::components::{Drawable3D, DrawableKind, Primitive, Transform, Visibility};
    use foundation::math::Vec3;

    fn sphere(world: &mut World) -> crate::entity::EntityId {
        let entity = world.spawn();
        world.set_transform(entity, Transform::translate(Vec3::new(1.0, 0.0, 0.0)));
        world.set_drawable(entity, Drawable3D::Primitive(Primitive::Sphere { radius: 1.0 }));
        entity
    }

    #[test]
    fn spawn_and_collect_drawables() {
        let mut world = World::new();
        let entity = sphere(&mut world);

        let drawables = world.drawables();
        assert_eq!(drawables.len(), 1);
        assert_eq!(drawables[0].0, entity);
        assert_eq!(world.drawables_of_kind(DrawableKind::Primitive), vec![entity]);
    }

    #[test]
    fn hidden_entities_are_filtered() {
        let mut world = World::new();
        let entity = sphere(&mut world);
        world.set_visibility(entity, Visibility::hidden());
        assert!(world.drawables().is_empty());
    }

    #[test]
    fn hierarchy_and_names() {
        let mut world = World::new();
        let root = world.spawn_child("scene", None);
        let group = world.spawn_child("wells", Some(root));
        let a = world.spawn_child("well-a", Some(group));
        let b = world.spawn_child("well-b", Some(group));

        assert_eq!(world.children(group), vec![a, b]);
        assert_eq!(world.parent(a), Some(group));
        assert_eq!(world.find_by_name("well-b"), Some(b));
        assert_eq!(world.len(), 4);
    }

    #[test]
    fn display_flags_are_per_entity() {
        let mut world = World::new();
        let a = sphere(&mut world);
        let b = sphere(&mut world);
        world.display_flags_mut(a).wireframe = true;
        assert!(world.display_flags(a).wireframe);
        assert!(!world.display_flags(b).wireframe);
    }
}
