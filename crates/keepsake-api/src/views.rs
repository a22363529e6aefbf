use keepsake_store::Backend;
use keepsake_types::events::{View, ViewData};

use crate::error::ApiResult;
use crate::gallery::list_photos;
use crate::memories::list_memories;
use crate::notes::load_thread;

/// Full contents of a view, as its page would fetch them.
pub async fn load_view(backend: &dyn Backend, view: View) -> ApiResult<ViewData> {
    Ok(match view {
        View::Gallery => ViewData::Gallery(list_photos(backend, false).await?),
        View::Memories => ViewData::Memories(list_memories(backend).await?),
        View::Notes => ViewData::Notes(load_thread(backend).await?),
    })
}
