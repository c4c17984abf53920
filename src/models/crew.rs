use crate::database::get_db;
use crate::error::CoreError;

use futures::StreamExt;
use mongodb::{
    bson::{doc, from_document, oid::ObjectId, to_bson, DateTime, Document},
    Collection, Database,
};
use serde::{Deserialize, Serialize};

use super::user::{User, UserRole};

#[derive(Debug, Deserialize, Serialize)]
pub struct Crew {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub name: String,
    pub leader_id: ObjectId,
    pub member_id: Vec<ObjectId>,
    pub deleted_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}
#[derive(Debug)]
pub struct CrewQuery {
    pub leader_id: Option<ObjectId>,
    pub limit: Option<usize>,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct CrewRequest {
    pub name: String,
    pub leader_id: ObjectId,
    pub member_id: Vec<ObjectId>,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct CrewResponse {
    pub _id: String,
    pub name: String,
    pub leader_id: String,
    pub member_id: Vec<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// The leader must not also be listed as a member. Enforced here, not in
/// the client.
pub fn leader_overlaps(leader_id: &ObjectId, member_id: &[ObjectId]) -> bool {
    member_id.iter().any(|member| member == leader_id)
}

impl Crew {
    async fn validate_members(&self) -> Result<(), CoreError> {
        for user_id in std::iter::once(&self.leader_id).chain(self.member_id.iter()) {
            match User::find_by_id(user_id).await {
                Ok(Some(user)) if user.role == UserRole::Worker => (),
                _ => return Err(CoreError::not_found("WORKER")),
            }
        }
        Ok(())
    }
    pub async fn save(&mut self) -> Result<ObjectId, CoreError> {
        let db: Database = get_db();
        let collection: Collection<Crew> = db.collection::<Crew>("crews");

        self.validate_members().await?;

        self._id = Some(ObjectId::new());

        collection
            .insert_one(&*self, None)
            .await
            .map_err(CoreError::store)
            .map(|result| result.inserted_id.as_object_id().unwrap())
    }
    pub async fn update(&mut self) -> Result<ObjectId, CoreError> {
        let db: Database = get_db();
        let collection: Collection<Crew> = db.collection::<Crew>("crews");

        self.validate_members().await?;

        self.updated_at = DateTime::now();

        collection
            .update_one(
                doc! { "_id": self._id.unwrap() },
                doc! { "$set": to_bson::<Crew>(self).unwrap() },
                None,
            )
            .await
            .map_err(CoreError::store)
            .map(|_| self._id.unwrap())
    }
    pub async fn find_by_id(_id: &ObjectId) -> Result<Option<Crew>, CoreError> {
        let db: Database = get_db();
        let collection: Collection<Crew> = db.collection::<Crew>("crews");

        collection
            .find_one(doc! { "_id": _id, "deleted_at": null }, None)
            .await
            .map_err(CoreError::store)
    }
    pub async fn find_many(query: &CrewQuery) -> Result<Vec<CrewResponse>, CoreError> {
        let db: Database = get_db();
        let collection: Collection<Crew> = db.collection::<Crew>("crews");

        let mut matches: Document = doc! { "deleted_at": null };
        if let Some(leader_id) = query.leader_id {
            matches.insert("leader_id", leader_id);
        }

        let mut pipeline: Vec<Document> = vec![doc! { "$match": matches }];
        if let Some(limit) = query.limit {
            pipeline.push(doc! {
                "$limit": to_bson::<usize>(&limit).unwrap()
            });
        }
        pipeline.push(doc! {
            "$project": {
                "_id": { "$toString": "$_id" },
                "name": "$name",
                "leader_id": { "$toString": "$leader_id" },
                "member_id": {
                    "$map": {
                        "input": "$member_id",
                        "in": { "$toString": "$$this" },
                    }
                },
                "created_at": "$created_at",
                "updated_at": "$updated_at",
            }
        });

        let mut cursor = collection
            .aggregate(pipeline, None)
            .await
            .map_err(CoreError::store)?;

        let mut crews: Vec<CrewResponse> = Vec::new();
        while let Some(Ok(doc)) = cursor.next().await {
            let crew: CrewResponse = from_document::<CrewResponse>(doc).unwrap();
            crews.push(crew);
        }
        Ok(crews)
    }
    pub async fn count() -> Result<u64, CoreError> {
        let db: Database = get_db();
        let collection: Collection<Crew> = db.collection::<Crew>("crews");

        collection
            .count_documents(doc! { "deleted_at": null }, None)
            .await
            .map_err(CoreError::store)
    }
    pub async fn delete(&mut self) -> Result<ObjectId, CoreError> {
        let now = DateTime::now();
        self.deleted_at = Some(now);
        self.updated_at = now;

        let db: Database = get_db();
        let collection: Collection<Crew> = db.collection::<Crew>("crews");

        collection
            .update_one(
                doc! { "_id": self._id.unwrap() },
                doc! { "$set": to_bson::<Crew>(self).unwrap() },
                None,
            )
            .await
            .map_err(CoreError::store)
            .map(|_| self._id.unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leader_listed_as_member_is_an_overlap() {
        let leader = ObjectId::new();
        let members = vec![ObjectId::new(), leader, ObjectId::new()];
        assert!(leader_overlaps(&leader, &members));
    }

    #[test]
    fn disjoint_leader_and_members_pass() {
        let leader = ObjectId::new();
        let members = vec![ObjectId::new(), ObjectId::new()];
        assert!(!leader_overlaps(&leader, &members));
        assert!(!leader_overlaps(&leader, &[]));
    }
}
