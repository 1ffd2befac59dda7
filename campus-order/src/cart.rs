use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use campus_core::ProductLookup;
use campus_shared::models::cart::MAX_QUANTITY;
use campus_shared::models::CartLine;

use crate::error::{OrderError, OrderResult};
use crate::repository::CartStore;

/// Cart lines that belong to one stall, in cart order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StallGroup {
    pub stall_id: Uuid,
    pub lines: Vec<CartLine>,
}

/// A validated cart selection split by stall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupedLines {
    groups: Vec<StallGroup>,
}

impl GroupedLines {
    /// Groups are ordered by the first appearance of their stall.
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        let mut groups: Vec<StallGroup> = Vec::new();

        for line in lines {
            match groups.iter_mut().find(|g| g.stall_id == line.stall_id) {
                Some(group) => group.lines.push(line),
                None => groups.push(StallGroup {
                    stall_id: line.stall_id,
                    lines: vec![line],
                }),
            }
        }

        Self { groups }
    }

    pub fn stall_count(&self) -> usize {
        self.groups.len()
    }

    pub fn groups(&self) -> &[StallGroup] {
        &self.groups
    }

    pub fn line_ids(&self) -> Vec<Uuid> {
        self.groups
            .iter()
            .flat_map(|g| g.lines.iter().map(|l| l.id))
            .collect()
    }
}

/// Turns the cart-item ids a user picked into stall-grouped lines.
pub struct CartSnapshotReader {
    carts: Arc<dyn CartStore>,
}

impl CartSnapshotReader {
    pub fn new(carts: Arc<dyn CartStore>) -> Self {
        Self { carts }
    }

    pub async fn resolve(&self, user_id: Uuid, cart_item_ids: &[Uuid]) -> OrderResult<GroupedLines> {
        let mut seen = HashSet::new();
        let ids: Vec<Uuid> = cart_item_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        if ids.is_empty() {
            return Err(OrderError::EmptySelection);
        }

        let lines = self.carts.resolve(user_id, &ids).await?;

        if lines.len() != ids.len() {
            let found: HashSet<Uuid> = lines.iter().map(|l| l.id).collect();
            let missing = ids.into_iter().filter(|id| !found.contains(id)).collect();
            return Err(OrderError::NotOwned(missing));
        }

        Ok(GroupedLines::from_lines(lines))
    }
}

/// Add, update and remove operations on a user's cart.
pub struct CartService {
    carts: Arc<dyn CartStore>,
    products: Arc<dyn ProductLookup>,
}

impl CartService {
    pub fn new(carts: Arc<dyn CartStore>, products: Arc<dyn ProductLookup>) -> Self {
        Self { carts, products }
    }

    pub async fn list(&self, user_id: Uuid) -> OrderResult<Vec<CartLine>> {
        Ok(self.carts.list_for_user(user_id).await?)
    }

    /// Adds `quantity` of a product, merging with an existing line for the
    /// same product.
    pub async fn add(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> OrderResult<CartLine> {
        if !CartLine::is_valid_quantity(quantity) {
            return Err(OrderError::InvalidQuantity(quantity));
        }

        let product = self
            .products
            .get_by_ids(&[product_id])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| OrderError::not_found("product", product_id))?;

        if !product.is_available() {
            return Err(OrderError::ProductUnavailable(vec![product.name]));
        }

        let candidate = CartLine::new(user_id, product_id, product.stall_id, quantity);
        let Some(line) = self.carts.merge_line(&candidate, MAX_QUANTITY).await? else {
            let existing = self
                .carts
                .find_line(user_id, product_id)
                .await?
                .map_or(0, |l| l.quantity);
            return Err(OrderError::InvalidQuantity(existing + quantity));
        };

        tracing::debug!("Cart line {} now holds {} of {}", line.id, line.quantity, product_id);
        Ok(line)
    }

    /// Sets the quantity of a line. Zero removes the line and returns `None`.
    pub async fn update(&self, user_id: Uuid, line_id: Uuid, quantity: i32) -> OrderResult<Option<CartLine>> {
        if quantity == 0 {
            self.remove(user_id, line_id).await?;
            return Ok(None);
        }
        if !CartLine::is_valid_quantity(quantity) {
            return Err(OrderError::InvalidQuantity(quantity));
        }

        let mut line = self.owned_line(user_id, line_id).await?;
        line.set_quantity(quantity);
        self.carts.upsert_line(&line).await?;
        Ok(Some(line))
    }

    pub async fn remove(&self, user_id: Uuid, line_id: Uuid) -> OrderResult<()> {
        self.owned_line(user_id, line_id).await?;
        self.carts.delete_lines(user_id, &[line_id]).await?;
        Ok(())
    }

    async fn owned_line(&self, user_id: Uuid, line_id: Uuid) -> OrderResult<CartLine> {
        match self.carts.get_line(line_id).await? {
            Some(line) if line.user_id == user_id => Ok(line),
            _ => Err(OrderError::NotOwned(vec![line_id])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(stall_id: Uuid) -> CartLine {
        CartLine::new(Uuid::nil(), Uuid::new_v4(), stall_id, 1)
    }

    #[test]
    fn test_groups_by_stall_preserving_order() {
        let stall_a = Uuid::new_v4();
        let stall_b = Uuid::new_v4();
        let lines = vec![line(stall_a), line(stall_b), line(stall_a), line(stall_b), line(stall_a)];
        let ids: Vec<Uuid> = lines.iter().map(|l| l.id).collect();

        let grouped = GroupedLines::from_lines(lines);

        assert_eq!(grouped.stall_count(), 2);
        assert_eq!(grouped.groups()[0].stall_id, stall_a);
        let a_ids: Vec<Uuid> = grouped.groups()[0].lines.iter().map(|l| l.id).collect();
        assert_eq!(a_ids, vec![ids[0], ids[2], ids[4]]);
        let b_ids: Vec<Uuid> = grouped.groups()[1].lines.iter().map(|l| l.id).collect();
        assert_eq!(b_ids, vec![ids[1], ids[3]]);
    }

    #[test]
    fn test_line_ids_cover_every_group() {
        let grouped = GroupedLines::from_lines(vec![line(Uuid::new_v4()), line(Uuid::new_v4())]);
        assert_eq!(grouped.line_ids().len(), 2);
    }
}
