use serde::{Deserialize, Serialize};

use crate::{CollectionId, DecisionError, GroupId, Restaurant, RestaurantId, UserId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum Owner {
    User(UserId),
    Group(GroupId),
}

/// An ordered set of restaurants. Restaurant IDs are unique within a collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CollectionData")]
pub struct Collection {
    pub id: CollectionId,
    pub name: String,
    pub owner: Owner,
    restaurants: Vec<Restaurant>,
}

#[derive(Deserialize)]
struct CollectionData {
    id: CollectionId,
    name: String,
    owner: Owner,
    #[serde(default)]
    restaurants: Vec<Restaurant>,
}

impl TryFrom<CollectionData> for Collection {
    type Error = DecisionError;
    fn try_from(data: CollectionData) -> Result<Self, Self::Error> {
        let mut collection = Collection::new(data.id, data.name, data.owner);
        for restaurant in data.restaurants {
            collection.add(restaurant)?;
        }
        Ok(collection)
    }
}

impl Collection {
    pub fn new(id: impl Into<CollectionId>, name: impl Into<String>, owner: Owner) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            owner,
            restaurants: Vec::new(),
        }
    }

    pub fn add(&mut self, restaurant: Restaurant) -> Result<(), DecisionError> {
        if self.contains(&restaurant.id) {
            return Err(DecisionError::DuplicateRestaurant(restaurant.id));
        }
        self.restaurants.push(restaurant);
        Ok(())
    }

    pub fn remove(&mut self, id: &RestaurantId) -> Option<Restaurant> {
        let index = self.restaurants.iter().position(|r| &r.id == id)?;
        Some(self.restaurants.remove(index))
    }

    pub fn get(&self, id: &RestaurantId) -> Option<&Restaurant> {
        self.restaurants.iter().find(|r| &r.id == id)
    }

    pub fn contains(&self, id: &RestaurantId) -> bool {
        self.get(id).is_some()
    }

    pub fn restaurants(&self) -> &[Restaurant] {
        &self.restaurants
    }

    pub fn len(&self) -> usize {
        self.restaurants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.restaurants.is_empty()
    }
}
