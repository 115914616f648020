use super::*;

const BORDER: i32 = 8;

fn negotiator_at(bounds: Rect, maximized: bool) -> GeometryNegotiator {
    let mut negotiator = GeometryNegotiator::new(BORDER);
    negotiator.on_bounds_changed(bounds, maximized);
    negotiator
}

fn window() -> Rect {
    Rect::from_xywh(100, 50, 800, 600)
}

mod bounds {
    use super::*;

    #[test]
    fn test_normal_window_offsets_surface_by_inset() {
        let mut negotiator = GeometryNegotiator::new(BORDER);

        let surface = negotiator.on_bounds_changed(window(), false);

        assert_eq!(surface, Rect::from_xywh(8, 8, 784, 584));
        assert_eq!(negotiator.state().border_inset(), BORDER);
    }

    #[test]
    fn test_maximized_window_surface_fills_window() {
        let mut negotiator = GeometryNegotiator::new(BORDER);

        let surface = negotiator.on_bounds_changed(window(), true);

        assert_eq!(surface, Rect::from_xywh(0, 0, 800, 600));
        assert_eq!(negotiator.state().border_inset(), 0);
    }

    #[test]
    fn test_inset_is_zero_exactly_when_maximized() {
        let mut negotiator = GeometryNegotiator::new(BORDER);
        for maximized in [false, true, true, false, true, false] {
            negotiator.on_bounds_changed(window(), maximized);
            let state = negotiator.state();
            assert_eq!(state.border_inset() == 0, state.is_maximized_or_snapped());
        }
    }

    #[test]
    fn test_zero_border_width_is_clamped() {
        let mut negotiator = GeometryNegotiator::new(0);
        negotiator.on_bounds_changed(window(), false);
        assert_eq!(negotiator.state().border_inset(), 1);
    }

    #[test]
    fn test_border_width_change_recomputes_surface() {
        let mut negotiator = negotiator_at(window(), false);

        let surface = negotiator.set_border_width(12);

        assert_eq!(surface, Rect::from_xywh(12, 12, 776, 576));
    }

    #[test]
    fn test_min_track_size_scales_with_dpi() {
        let negotiator = GeometryNegotiator::new(8).with_min_size(400, 300);
        assert_eq!(negotiator.min_track_size(1.0), (400, 300));
        assert_eq!(negotiator.min_track_size(1.5), (600, 450));
    }

    #[test]
    fn test_tiny_window_surface_never_negative() {
        let negotiator = negotiator_at(Rect::from_xywh(0, 0, 10, 10), false);
        let surface = negotiator.state().surface_bounds();
        assert_eq!(surface.width(), 0);
        assert_eq!(surface.height(), 0);
    }
}

mod hit_test {
    use super::*;

    #[test]
    fn test_corners_and_edges() {
        let negotiator = negotiator_at(window(), false);
        let cases = [
            (Point::new(100, 50), HitRegion::TopLeft),
            (Point::new(899, 50), HitRegion::TopRight),
            (Point::new(100, 649), HitRegion::BottomLeft),
            (Point::new(899, 649), HitRegion::BottomRight),
            (Point::new(100, 300), HitRegion::Left),
            (Point::new(899, 300), HitRegion::Right),
            (Point::new(500, 50), HitRegion::Top),
            (Point::new(500, 649), HitRegion::Bottom),
            (Point::new(500, 300), HitRegion::Client),
        ];
        for (point, expected) in cases {
            assert_eq!(negotiator.hit_test(point), expected, "{point:?}");
        }
    }

    #[test]
    fn test_outside_window_is_nowhere() {
        let negotiator = negotiator_at(window(), false);
        assert_eq!(negotiator.hit_test(Point::new(99, 300)), HitRegion::Nowhere);
        assert_eq!(negotiator.hit_test(Point::new(900, 300)), HitRegion::Nowhere);
        assert_eq!(negotiator.hit_test(Point::new(500, 650)), HitRegion::Nowhere);
    }

    #[test]
    fn test_no_inset_point_is_client() {
        let negotiator = negotiator_at(Rect::from_xywh(0, 0, 60, 40), false);
        let bounds = negotiator.state().bounds();
        for y in bounds.top..bounds.bottom {
            for x in bounds.left..bounds.right {
                let in_band = x < BORDER || x >= 60 - BORDER || y < BORDER || y >= 40 - BORDER;
                let region = negotiator.hit_test(Point::new(x, y));
                if in_band {
                    assert!(region.is_resize_edge(), "({x}, {y}) -> {region:?}");
                } else {
                    assert_eq!(region, HitRegion::Client);
                }
            }
        }
    }

    #[test]
    fn test_maximized_edges_are_client() {
        let negotiator = negotiator_at(window(), true);
        assert_eq!(negotiator.hit_test(Point::new(100, 50)), HitRegion::Client);
        assert_eq!(negotiator.hit_test(Point::new(899, 300)), HitRegion::Client);
    }

    #[test]
    fn test_identical_inputs_identical_region() {
        let a = negotiator_at(window(), false);
        let b = negotiator_at(window(), false);
        for point in [Point::new(103, 55), Point::new(400, 400), Point::new(898, 648)] {
            assert_eq!(a.hit_test(point), b.hit_test(point));
            assert_eq!(a.hit_test(point), a.hit_test(point));
        }
    }

    #[test]
    fn test_codes_match_win32() {
        assert_eq!(HitRegion::Client.code(), 1);
        assert_eq!(HitRegion::Caption.code(), 2);
        assert_eq!(HitRegion::TopLeft.code(), 13);
        assert_eq!(HitRegion::BottomRight.code(), 17);
    }
}

mod drag_regions {
    use super::*;

    #[test]
    fn test_drag_region_is_caption() {
        let mut negotiator = negotiator_at(window(), false);
        negotiator.set_drag_regions(&[Rect::from_xywh(0, 0, 200, 40)]);

        // Surface origin is (108, 58) in screen space.
        assert_eq!(negotiator.hit_test(Point::new(108, 58)), HitRegion::Caption);
        assert_eq!(negotiator.hit_test(Point::new(307, 97)), HitRegion::Caption);
        assert_eq!(negotiator.hit_test(Point::new(308, 97)), HitRegion::Client);
    }

    #[test]
    fn test_regions_are_unioned() {
        let mut negotiator = negotiator_at(window(), true);
        negotiator.set_drag_regions(&[
            Rect::from_xywh(0, 0, 100, 40),
            Rect::from_xywh(50, 0, 100, 40),
        ]);

        assert_eq!(negotiator.hit_test(Point::new(110, 60)), HitRegion::Caption);
        assert_eq!(negotiator.hit_test(Point::new(240, 60)), HitRegion::Caption);
        assert_eq!(negotiator.hit_test(Point::new(260, 60)), HitRegion::Client);
    }

    #[test]
    fn test_resize_band_wins_over_drag_region() {
        let mut negotiator = negotiator_at(window(), false);
        negotiator.set_drag_regions(&[Rect::from_xywh(-8, -8, 800, 48)]);

        assert_eq!(negotiator.hit_test(Point::new(500, 50)), HitRegion::Top);
        assert_eq!(negotiator.hit_test(Point::new(500, 60)), HitRegion::Caption);
    }

    #[test]
    fn test_replacing_regions_clears_old_ones() {
        let mut negotiator = negotiator_at(window(), false);
        negotiator.set_drag_regions(&[Rect::from_xywh(0, 0, 100, 40)]);
        negotiator.set_drag_regions(&[]);

        assert_eq!(negotiator.hit_test(Point::new(120, 60)), HitRegion::Client);
        assert!(negotiator.state().drag_regions().is_empty());
    }

    #[test]
    fn test_excess_and_empty_regions_dropped() {
        let mut negotiator = negotiator_at(window(), false);
        let mut regions = vec![Rect::ZERO];
        regions.extend((0..MAX_DRAG_REGIONS as i32 + 4).map(|i| Rect::from_xywh(i * 10, 0, 5, 5)));

        negotiator.set_drag_regions(&regions);

        assert_eq!(negotiator.state().drag_regions().len(), MAX_DRAG_REGIONS);
        assert_eq!(negotiator.state().drag_regions()[0], Rect::from_xywh(0, 0, 5, 5));
    }

    #[test]
    fn test_scaled_regions_cover_source() {
        let scaled = Rect::from_xywh(1, 1, 3, 3).scaled(1.5);
        assert_eq!(scaled, Rect::new(1, 1, 6, 6));
    }
}

mod redraw {
    use super::*;

    #[test]
    fn test_calc_client_is_full_window_with_zero_area_preserve() {
        let negotiator = negotiator_at(window(), false);

        let result = negotiator.on_calc_client(window());

        assert_eq!(result.client, window());
        assert!(result.validated);
        for rect in result.preserve {
            assert_eq!(rect.width(), 0);
            assert_eq!(rect.height(), 0);
        }
    }

    #[test]
    fn test_position_changing_disables_copy_bits() {
        let negotiator = negotiator_at(window(), false);
        let flags = WindowPosFlags::NO_Z_ORDER | WindowPosFlags::NO_ACTIVATE;

        let adjusted = negotiator.on_position_changing(flags);

        assert!(adjusted.contains(WindowPosFlags::NO_COPY_BITS));
        assert!(adjusted.contains(flags));
    }

    #[test]
    fn test_copy_bits_suppressed_when_already_set() {
        let flags = suppress_pixel_copy(WindowPosFlags::NO_COPY_BITS);
        assert_eq!(flags, WindowPosFlags::NO_COPY_BITS);
    }
}
