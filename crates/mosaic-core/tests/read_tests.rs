//! End-to-end reads over a fixture mosaic: output grid, overview choice,
//! granule placement and the executor.
//!
//! Fixture granules hold `offset + row * 1000 + col`, so each assertion
//! pins the exact source pixel an output pixel came from.

use std::sync::Arc;

use mosaic_common::BoundingBox;
use mosaic_core::{
    GranuleExecutor, MosaicConfig, MosaicError, OverviewPolicy, ReadOutcome, ReadRequest, ResponseState,
    RasterLayerResponse, SampleType,
};
use test_utils::{assert_rasters_identical, MosaicFixture};

// ============================================================================
// Empty and degenerate requests
// ============================================================================

#[tokio::test]
async fn test_disjoint_request_is_empty() {
    let manager = MosaicFixture::grid(2, 2, 8).open().await;

    let outcome = manager
        .read(&ReadRequest::new(BoundingBox::new(100.0, 100.0, 110.0, 110.0)))
        .await
        .unwrap();
    assert!(outcome.is_empty());
    assert!(outcome.mosaic().is_none());
}

#[tokio::test]
async fn test_request_touching_envelope_edge_is_empty() {
    let manager = MosaicFixture::grid(2, 2, 8).open().await;

    let outcome = manager
        .read(&ReadRequest::new(BoundingBox::new(16.0, 0.0, 20.0, 16.0)))
        .await
        .unwrap();
    assert!(matches!(outcome, ReadOutcome::Empty));
}

#[tokio::test]
async fn test_point_request_reads_one_pixel() {
    let manager = MosaicFixture::grid(2, 2, 8).open().await;

    let mosaic = manager
        .read(&ReadRequest::new(BoundingBox::new(3.5, 12.5, 3.5, 12.5)))
        .await
        .unwrap()
        .into_mosaic()
        .unwrap();

    assert_eq!((mosaic.raster.width, mosaic.raster.height), (1, 1));
    assert_eq!(mosaic.raster.data, vec![3003.0]);
}

#[tokio::test]
async fn test_invalid_request_is_rejected() {
    let manager = MosaicFixture::grid(1, 1, 4).open().await;

    let result = manager
        .read(&ReadRequest::new(BoundingBox::new(4.0, 0.0, 0.0, 4.0)))
        .await;
    assert!(matches!(result, Err(MosaicError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_oversized_output_is_refused() {
    let fixture = MosaicFixture::grid(1, 1, 4);
    let decoder = Arc::new(fixture.decoder());
    let manager = fixture
        .open_with(fixture.config(), decoder.clone(), None)
        .await;

    // Too wide for integer pixel space.
    let huge = BoundingBox::new(-1e300, -1e300, 1e300, 1e300);
    let result = manager.read(&ReadRequest::new(huge)).await;
    assert!(matches!(result, Err(MosaicError::InvalidRequest(_))));

    // Representable, but width * height overflows.
    let wide = BoundingBox::new(-1e10, -1e10, 1e10, 1e10);
    let result = manager.read(&ReadRequest::new(wide)).await;
    assert!(matches!(result, Err(MosaicError::InvalidRequest(_))));

    assert_eq!(decoder.decode_count(), 0);
}

#[tokio::test]
async fn test_configured_output_pixel_limit() {
    let fixture = MosaicFixture::grid(2, 2, 8);
    let config = MosaicConfig {
        max_output_pixels: 64,
        ..fixture.config()
    };
    let manager = fixture
        .open_with(config, Arc::new(fixture.decoder()), None)
        .await;

    let refused = manager.read(&ReadRequest::new(fixture.envelope())).await;
    assert!(matches!(refused, Err(MosaicError::InvalidRequest(_))));

    // Same box at half resolution is 8x8.
    let mosaic = manager
        .read(&ReadRequest::new(fixture.envelope()).with_size(8, 8))
        .await
        .unwrap()
        .into_mosaic()
        .unwrap();
    assert_eq!((mosaic.raster.width, mosaic.raster.height), (8, 8));
}

// ============================================================================
// Placement at native resolution
// ============================================================================

#[tokio::test]
async fn test_full_envelope_read() {
    let fixture = MosaicFixture::grid(2, 2, 8);
    let manager = fixture.open().await;

    let mosaic = manager
        .read(&ReadRequest::new(fixture.envelope()).with_size(16, 16))
        .await
        .unwrap()
        .into_mosaic()
        .unwrap();

    assert_eq!((mosaic.raster.width, mosaic.raster.height), (16, 16));
    assert_eq!((mosaic.matched, mosaic.loaded), (4, 4));
    assert_eq!(mosaic.raster.layout.sample_type, SampleType::I32);

    for row in 0..16 {
        for col in 0..16 {
            let (gc, gr) = (col / 8, row / 8);
            let expected = fixture.offset(0, 0, gc, gr) as f64
                + ((row % 8) * 1000 + col % 8) as f64;
            assert_eq!(
                mosaic.raster.get(col, row, 0),
                expected,
                "pixel ({}, {})",
                col,
                row
            );
        }
    }
}

#[tokio::test]
async fn test_single_granule_crop_is_exact() {
    let manager = MosaicFixture::grid(2, 2, 8).open().await;
    let bbox = BoundingBox::new(2.0, 10.0, 6.0, 14.0);

    let mosaic = manager
        .read(&ReadRequest::new(bbox))
        .await
        .unwrap()
        .into_mosaic()
        .unwrap();

    assert_eq!(mosaic.matched, 1);
    assert_eq!((mosaic.raster.width, mosaic.raster.height), (4, 4));
    assert_eq!(mosaic.world_bounds(), bbox);
    for j in 0..4 {
        for i in 0..4 {
            let expected = ((2 + j) * 1000 + 2 + i) as f64;
            assert_eq!(mosaic.raster.get(i, j, 0), expected);
        }
    }
}

#[tokio::test]
async fn test_response_metadata() {
    let manager = MosaicFixture::grid(1, 1, 4).open().await;

    let mosaic = manager
        .read(&ReadRequest::new(BoundingBox::new(0.0, 0.0, 4.0, 4.0)))
        .await
        .unwrap()
        .into_mosaic()
        .unwrap();

    assert_eq!(mosaic.bands.len(), 1);
    assert_eq!(mosaic.bands[0].name, "gray");
    assert_eq!(mosaic.bands[0].data_type, SampleType::I32);
    assert_eq!(mosaic.bands[0].no_data, Some(i32::MIN as f64));
    assert_eq!(mosaic.crs, manager.crs());
    assert_eq!(mosaic.level, 0);
    assert_eq!((mosaic.subsampling_x, mosaic.subsampling_y), (1, 1));
}

#[tokio::test]
async fn test_repeated_reads_are_identical() {
    let fixture = MosaicFixture::grid(3, 2, 6);
    let manager = fixture.open().await;
    let request = ReadRequest::new(BoundingBox::new(1.3, 0.7, 16.2, 11.1)).with_size(9, 7);

    let first = manager.read(&request).await.unwrap().into_mosaic().unwrap();
    let second = manager.read(&request).await.unwrap().into_mosaic().unwrap();

    assert_rasters_identical!(first.raster, second.raster);
    assert_eq!(first.bounds, second.bounds);
}

#[tokio::test]
async fn test_new_response_starts_empty() {
    let manager = MosaicFixture::grid(1, 1, 4).open().await;
    let request = ReadRequest::new(BoundingBox::new(0.0, 0.0, 1.0, 1.0));

    assert_eq!(
        RasterLayerResponse::new(&manager, &request).state(),
        ResponseState::Empty
    );
}

// ============================================================================
// Overviews and subsampling
// ============================================================================

async fn read_with_policy(policy: OverviewPolicy, resolution: f64) -> mosaic_core::MosaicResponse {
    let fixture = MosaicFixture::grid(1, 1, 16).with_overviews(&[1, 2, 4]);
    let manager = fixture.open().await;
    manager
        .read(
            &ReadRequest::new(fixture.envelope())
                .with_resolution(resolution, resolution)
                .with_policy(policy),
        )
        .await
        .unwrap()
        .into_mosaic()
        .unwrap()
}

#[tokio::test]
async fn test_quality_reads_finer_level() {
    let mosaic = read_with_policy(OverviewPolicy::Quality, 3.0).await;

    assert_eq!(mosaic.level, 1);
    assert_eq!((mosaic.subsampling_x, mosaic.subsampling_y), (1, 1));
    assert_eq!((mosaic.raster.width, mosaic.raster.height), (8, 8));
    assert_eq!(mosaic.raster.get(3, 5, 0), (2 * 5 * 1000 + 2 * 3) as f64);
}

#[tokio::test]
async fn test_speed_reads_coarser_level() {
    let mosaic = read_with_policy(OverviewPolicy::Speed, 3.0).await;

    assert_eq!(mosaic.level, 2);
    assert_eq!((mosaic.raster.width, mosaic.raster.height), (4, 4));
    assert_eq!(mosaic.raster.get(1, 2, 0), (4 * 2 * 1000 + 4) as f64);
}

#[tokio::test]
async fn test_nearest_picks_closest_level() {
    let mosaic = read_with_policy(OverviewPolicy::Nearest, 3.0).await;
    assert_eq!(mosaic.level, 2);

    let mosaic = read_with_policy(OverviewPolicy::Nearest, 2.1).await;
    assert_eq!(mosaic.level, 1);
}

#[tokio::test]
async fn test_ignore_reads_native() {
    let mosaic = read_with_policy(OverviewPolicy::Ignore, 3.0).await;

    assert_eq!(mosaic.level, 0);
    assert_eq!((mosaic.raster.width, mosaic.raster.height), (16, 16));
    assert_eq!(mosaic.raster.get(7, 9, 0), 9007.0);
}

#[tokio::test]
async fn test_subsampling_without_overviews() {
    let fixture = MosaicFixture::grid(1, 1, 16);
    let manager = fixture.open().await;

    let mosaic = manager
        .read(&ReadRequest::new(fixture.envelope()).with_resolution(4.0, 4.0))
        .await
        .unwrap()
        .into_mosaic()
        .unwrap();

    assert_eq!(mosaic.level, 0);
    assert_eq!((mosaic.subsampling_x, mosaic.subsampling_y), (4, 4));
    assert_eq!((mosaic.raster.width, mosaic.raster.height), (4, 4));
    // Nearest neighbour on output pixel centres.
    for j in 0..4 {
        for i in 0..4 {
            let expected = ((4 * j + 2) * 1000 + 4 * i + 2) as f64;
            assert_eq!(mosaic.raster.get(i, j, 0), expected);
        }
    }
}

// ============================================================================
// Executor
// ============================================================================

#[tokio::test]
async fn test_pooled_and_inline_reads_match() {
    let fixture = MosaicFixture::grid(4, 4, 8);
    let request = ReadRequest::new(BoundingBox::new(3.0, 2.0, 29.0, 30.0)).with_size(13, 14);

    let pooled = fixture
        .open_with(
            fixture.config(),
            Arc::new(fixture.decoder()),
            Some(Arc::new(GranuleExecutor::pooled(4))),
        )
        .await;
    let inline = fixture
        .open_with(
            fixture.config(),
            Arc::new(fixture.decoder()),
            Some(Arc::new(GranuleExecutor::inline())),
        )
        .await;

    let a = pooled.read(&request).await.unwrap().into_mosaic().unwrap();
    let b = inline.read(&request).await.unwrap().into_mosaic().unwrap();

    assert!(pooled.executor().is_pooled());
    assert!(!inline.executor().is_pooled());
    assert_eq!(a.loaded, 16);
    assert_rasters_identical!(a.raster, b.raster);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reads_share_one_manager() {
    let fixture = MosaicFixture::grid(3, 3, 8);
    let manager = Arc::new(fixture.open().await);
    let request = ReadRequest::new(fixture.envelope());

    let expected = manager.read(&request).await.unwrap().into_mosaic().unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = manager.clone();
            let request = request.clone();
            tokio::spawn(async move { manager.read(&request).await })
        })
        .collect();

    for handle in handles {
        let mosaic = handle.await.unwrap().unwrap().into_mosaic().unwrap();
        assert_rasters_identical!(mosaic.raster, expected.raster);
    }
}

#[tokio::test]
async fn test_shared_executor_serves_two_mosaics() {
    let executor = Arc::new(GranuleExecutor::pooled(2));
    let small = MosaicFixture::grid(1, 1, 4);
    let large = MosaicFixture::grid(2, 2, 4);

    let a = small
        .open_with(small.config(), Arc::new(small.decoder()), Some(executor.clone()))
        .await;
    let b = large
        .open_with(large.config(), Arc::new(large.decoder()), Some(executor))
        .await;

    let req_a = ReadRequest::new(small.envelope());
    let req_b = ReadRequest::new(large.envelope());
    let (ra, rb) = tokio::join!(a.read(&req_a), b.read(&req_b));
    assert_eq!(ra.unwrap().into_mosaic().unwrap().loaded, 1);
    assert_eq!(rb.unwrap().into_mosaic().unwrap().loaded, 4);
}
