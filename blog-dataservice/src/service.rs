use std::collections::HashMap;

use blog_bus::StreamBus;
use blog_store::{BulkUpdateFields, ListFilter, MySqlPool, NewRecord, Record};
use chrono::Utc;
use log::info;
use tonic::{Request, Response, Status};

use crate::blog::data_service_server::DataService;
use crate::blog::{
    Blog, BlogCreateRequest, BlogEnqueueResponse, BulkDeleteRequest, BulkDeleteResponse,
    BulkUpdateRequest, BulkUpdateResponse, CreateBlogSyncResponse, DeleteBlogRequest,
    DeleteBlogResponse, GetBlogRequest, GetBlogResponse, ListBlogsRequest, ListBlogsResponse,
    UpdateBlogRequest, UpdateBlogResponse,
};
use crate::error::{bus_status, not_found, store_status, validation_status};
use crate::validation::{clamp_limit, non_empty, validate_create};

pub struct DataServiceImpl {
    bus: StreamBus,
    store: MySqlPool,
    stream_maxlen: usize,
}

impl DataServiceImpl {
    pub fn new(bus: StreamBus, store: MySqlPool, stream_maxlen: usize) -> Self {
        Self {
            bus,
            store,
            stream_maxlen,
        }
    }
}

fn to_wire(record: Record) -> Blog {
    Blog {
        id: record.id,
        client_msg_id: record.client_msg_id.unwrap_or_default(),
        author: record.author,
        created_at_iso: record.created_at.to_rfc3339(),
        updated_at_iso: record.updated_at.to_rfc3339(),
        genre: record.genre,
        location: record.location,
        content: record.content,
    }
}

#[tonic::async_trait]
impl DataService for DataServiceImpl {
    /// Advertises the category, then appends the record. Mirrors §4.1: the
    /// registry write happens first so a failed append still leaves the
    /// consumer able to harmlessly create a group on an empty stream.
    async fn enqueue_blog(
        &self,
        request: Request<BlogCreateRequest>,
    ) -> Result<Response<BlogEnqueueResponse>, Status> {
        let req = request.into_inner();
        let valid = validate_create(
            &req.author,
            &req.content,
            &req.genre,
            &req.location,
            &req.created_at_iso,
            &req.client_msg_id,
        )
        .map_err(validation_status)?;

        let stream = StreamBus::stream_for_category(&valid.genre);

        self.bus
            .set_add(blog_bus::CATEGORY_REGISTRY, &valid.genre)
            .await
            .map_err(bus_status)?;

        let mut fields = HashMap::with_capacity(6);
        fields.insert("client_msg_id".to_string(), valid.client_msg_id);
        fields.insert("author".to_string(), valid.author);
        fields.insert("content".to_string(), valid.content);
        fields.insert("genre".to_string(), valid.genre);
        fields.insert("location".to_string(), valid.location);
        fields.insert("created_at_iso".to_string(), valid.created_at.to_rfc3339());

        let message_id = self
            .bus
            .append(&stream, &fields, self.stream_maxlen)
            .await
            .map_err(bus_status)?;

        info!("enqueued blog to {stream} id {message_id}");

        Ok(Response::new(BlogEnqueueResponse {
            enqueued: true,
            stream,
            message_id,
        }))
    }

    /// Same validation as `enqueue_blog`, but inserts directly through the
    /// store instead of publishing to the bus. No stream write happens here.
    async fn create_blog_sync(
        &self,
        request: Request<BlogCreateRequest>,
    ) -> Result<Response<CreateBlogSyncResponse>, Status> {
        let req = request.into_inner();
        let valid = validate_create(
            &req.author,
            &req.content,
            &req.genre,
            &req.location,
            &req.created_at_iso,
            &req.client_msg_id,
        )
        .map_err(validation_status)?;

        let now = Utc::now();
        let row = NewRecord {
            client_msg_id: Some(valid.client_msg_id),
            author: valid.author,
            created_at: valid.created_at,
            updated_at: now,
            genre: valid.genre,
            location: valid.location,
            content: valid.content,
        };

        let id = blog_store::insert_one(&self.store, &row)
            .await
            .map_err(store_status)?;

        Ok(Response::new(CreateBlogSyncResponse { id }))
    }

    async fn get_blog(
        &self,
        request: Request<GetBlogRequest>,
    ) -> Result<Response<GetBlogResponse>, Status> {
        let id = request.into_inner().id;
        let record = blog_store::select_by_id(&self.store, id)
            .await
            .map_err(store_status)?
            .ok_or_else(|| not_found("blog not found"))?;

        Ok(Response::new(GetBlogResponse {
            blog: Some(to_wire(record)),
        }))
    }

    async fn list_blogs(
        &self,
        request: Request<ListBlogsRequest>,
    ) -> Result<Response<ListBlogsResponse>, Status> {
        let req = request.into_inner();
        let filter = ListFilter {
            author: non_empty(&req.author),
            genre: non_empty(&req.genre),
            location: non_empty(&req.location),
            limit: clamp_limit(req.limit),
            offset: req.offset,
        };

        let records = blog_store::list(&self.store, &filter)
            .await
            .map_err(store_status)?;

        Ok(Response::new(ListBlogsResponse {
            blogs: records.into_iter().map(to_wire).collect(),
        }))
    }

    async fn update_blog(
        &self,
        request: Request<UpdateBlogRequest>,
    ) -> Result<Response<UpdateBlogResponse>, Status> {
        let req = request.into_inner();
        let updated_at = if req.updated_at_iso.is_empty() {
            Utc::now()
        } else {
            chrono::DateTime::parse_from_rfc3339(&req.updated_at_iso)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now())
        };

        let affected = blog_store::update_content(&self.store, req.id, &req.content, updated_at)
            .await
            .map_err(store_status)?;

        if affected == 0 {
            return Err(not_found("blog not found"));
        }

        Ok(Response::new(UpdateBlogResponse { updated: true }))
    }

    async fn delete_blog(
        &self,
        request: Request<DeleteBlogRequest>,
    ) -> Result<Response<DeleteBlogResponse>, Status> {
        let id = request.into_inner().id;
        let affected = blog_store::delete(&self.store, id)
            .await
            .map_err(store_status)?;

        if affected == 0 {
            return Err(not_found("blog not found"));
        }

        Ok(Response::new(DeleteBlogResponse { deleted: true }))
    }

    async fn bulk_delete(
        &self,
        request: Request<BulkDeleteRequest>,
    ) -> Result<Response<BulkDeleteResponse>, Status> {
        let ids = request.into_inner().ids;
        if ids.is_empty() {
            return Err(Status::invalid_argument("ids required"));
        }

        let deleted = blog_store::bulk_delete(&self.store, &ids)
            .await
            .map_err(store_status)?;

        Ok(Response::new(BulkDeleteResponse { deleted }))
    }

    async fn bulk_update(
        &self,
        request: Request<BulkUpdateRequest>,
    ) -> Result<Response<BulkUpdateResponse>, Status> {
        let req = request.into_inner();
        if req.ids.is_empty() {
            return Err(Status::invalid_argument("ids required"));
        }

        let fields = BulkUpdateFields {
            genre: non_empty(&req.genre),
            location: non_empty(&req.location),
            content: non_empty(&req.content),
        };
        if fields.is_empty() {
            return Err(Status::invalid_argument("no fields to update"));
        }

        let updated = blog_store::bulk_update(&self.store, &req.ids, &fields)
            .await
            .map_err(store_status)?;

        Ok(Response::new(BulkUpdateResponse { updated }))
    }
}
